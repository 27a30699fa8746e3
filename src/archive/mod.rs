//! Package archive writers.
//!
//! - [`zip_writer`] - primary `.zip` archive, written on a worker thread
//! - [`seven_zip`] - optional `.7z` re-compression through the `7z` tool
//! - [`filesystem`] - output file helpers (removal, moves, digests)
//!
//! The primary writer is asynchronous with respect to its caller: [`ArchiveSink::start`]
//! hands back a [`PendingArchive`], and the archive only counts as written
//! once [`PendingArchive::wait`] returns. The secondary compressor must not
//! start before that point.

pub mod filesystem;
pub mod seven_zip;
pub mod zip_writer;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use crate::error::{PackError, Result};
use crate::layout::ArchiveEntry;

/// An archive to write: entries in order, destination, deflate level.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    pub output: PathBuf,
    pub entries: Vec<ArchiveEntry>,
    pub compression_level: i64,
}

/// A sealed archive on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub path: PathBuf,
    pub entries: usize,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Completion handle for an archive being written.
pub struct PendingArchive {
    output: PathBuf,
    receiver: Receiver<Result<ArchiveReport>>,
    worker: Option<JoinHandle<()>>,
}

impl PendingArchive {
    /// A handle completed by whoever holds the returned sender.
    pub fn channel(output: &Path) -> (Sender<Result<ArchiveReport>>, Self) {
        let (sender, receiver) = mpsc::channel();
        let pending = Self {
            output: output.to_path_buf(),
            receiver,
            worker: None,
        };
        (sender, pending)
    }

    /// A handle that is already complete.
    pub fn completed(output: &Path, result: Result<ArchiveReport>) -> Self {
        let (sender, pending) = Self::channel(output);
        let _ = sender.send(result);
        pending
    }

    pub(crate) fn with_worker(mut self, worker: JoinHandle<()>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Block until the writer has flushed and closed the archive.
    pub fn wait(mut self) -> Result<ArchiveReport> {
        let outcome = self.receiver.recv();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        outcome.map_err(|_| {
            PackError::archive_write(&self.output, "writer stopped without signalling completion")
        })?
    }
}

/// Something that can write an archive from a list of entries.
pub trait ArchiveSink {
    fn start(&self, request: ArchiveRequest) -> Result<PendingArchive>;
}

/// Tool availability, checked before attempting secondary compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolProbe {
    Available(PathBuf),
    Missing { tool: String },
}

/// Best-effort re-compression of a finished primary archive.
pub trait SecondaryCompressor {
    fn probe(&self) -> Result<ToolProbe>;

    /// Produce the secondary archive for `primary`, replacing any previous one.
    fn recompress(&self, primary: &Path) -> Result<PathBuf>;
}

/// `packages/x.zip` → `packages/x.7z`
pub fn secondary_archive_path(primary: &Path) -> PathBuf {
    primary.with_extension("7z")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn secondary_path_swaps_extension() {
        assert_eq!(
            secondary_archive_path(Path::new("packages/launchui-v0.1.5-linux-x64.zip")),
            PathBuf::from("packages/launchui-v0.1.5-linux-x64.7z")
        );
    }

    #[test]
    fn wait_returns_what_the_writer_sends() {
        let output = Path::new("packages/a.zip");
        let (sender, pending) = PendingArchive::channel(output);
        let worker = thread::spawn(move || {
            let _ = sender.send(Ok(ArchiveReport {
                path: PathBuf::from("packages/a.zip"),
                entries: 3,
                size_bytes: 10,
                sha256: "00".into(),
            }));
        });

        let report = pending.with_worker(worker).wait().unwrap();
        assert_eq!(report.entries, 3);
    }

    #[test]
    fn dropped_sender_is_an_archive_error() {
        let (sender, pending) = PendingArchive::channel(Path::new("packages/a.zip"));
        drop(sender);

        let err = pending.wait().unwrap_err();
        assert!(matches!(err, PackError::ArchiveWrite { .. }));
    }
}
