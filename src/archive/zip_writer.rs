//! Primary `.zip` package writer.
//!
//! Entries are streamed into `<output>.partial` on a worker thread. Only after
//! the central directory is written and the file is synced and closed is the
//! partial file renamed to its final name and completion signalled. On any
//! failure the partial file is removed, so a `.zip` under `packages/` is
//! always complete.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::filesystem::{atomic_move, remove_file_if_exists, sha256_file};
use super::{ArchiveReport, ArchiveRequest, ArchiveSink, PendingArchive};
use crate::error::{PackError, Result};

/// Writes deflate-compressed zip archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveBuilder;

impl ArchiveSink for ZipArchiveBuilder {
    fn start(&self, request: ArchiveRequest) -> Result<PendingArchive> {
        if let Some(parent) = request.output.parent() {
            fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;
        }

        let output = request.output.clone();
        let (sender, pending) = PendingArchive::channel(&output);
        let worker = thread::Builder::new()
            .name("zip-writer".to_string())
            .spawn(move || {
                let _ = sender.send(write_zip(&request));
            })
            .map_err(|e| PackError::archive_write(&output, e))?;

        Ok(pending.with_worker(worker))
    }
}

/// Write `request` synchronously and seal it under its final name.
pub fn write_zip(request: &ArchiveRequest) -> Result<ArchiveReport> {
    let partial = partial_path(&request.output);

    if let Err(err) = write_entries(&partial, request) {
        let _ = remove_file_if_exists(&partial);
        return Err(err);
    }

    if let Err(err) = atomic_move(&partial, &request.output) {
        let _ = remove_file_if_exists(&partial);
        return Err(PackError::archive_write(
            &request.output,
            format!("moving '{}' into place: {}", partial.display(), err),
        ));
    }

    let (sha256, size_bytes) = sha256_file(&request.output)
        .map_err(|e| PackError::archive_write(&request.output, format!("hashing: {}", e)))?;

    tracing::info!(
        archive = %request.output.display(),
        entries = request.entries.len(),
        size_bytes,
        "wrote archive"
    );

    Ok(ArchiveReport {
        path: request.output.clone(),
        entries: request.entries.len(),
        size_bytes,
        sha256,
    })
}

fn write_entries(partial: &Path, request: &ArchiveRequest) -> Result<()> {
    let output = &request.output;
    let fail = |what: String| PackError::archive_write(output, what);

    let file = File::create(partial)
        .map_err(|e| fail(format!("creating '{}': {}", partial.display(), e)))?;
    let mut zip = ZipWriter::new(file);

    for entry in &request.entries {
        let mut source = File::open(&entry.source)
            .map_err(|e| fail(format!("opening '{}': {}", entry.source.display(), e)))?;
        let options = entry_options(&source, request.compression_level)
            .map_err(|e| fail(format!("reading '{}': {}", entry.source.display(), e)))?;

        zip.start_file(entry.destination.as_str(), options)
            .map_err(|e| fail(format!("adding '{}': {}", entry.destination, e)))?;
        io::copy(&mut source, &mut zip)
            .map_err(|e| fail(format!("streaming '{}': {}", entry.source.display(), e)))?;

        tracing::debug!(
            source = %entry.source.display(),
            destination = %entry.destination,
            "added entry"
        );
    }

    let file = zip
        .finish()
        .map_err(|e| fail(format!("finalizing: {}", e)))?;
    file.sync_all()
        .map_err(|e| fail(format!("flushing '{}': {}", partial.display(), e)))?;
    Ok(())
}

/// Deflate at `level`, keeping the source's permission bits on unix.
fn entry_options(source: &File, level: i64) -> io::Result<SimpleFileOptions> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = source.metadata()?.permissions().mode();
        Ok(options.unix_permissions(mode))
    }
    #[cfg(not(unix))]
    {
        let _ = source.metadata()?;
        Ok(options)
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ArchiveEntry;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn entry(source: PathBuf, destination: &str) -> ArchiveEntry {
        ArchiveEntry {
            source,
            destination: destination.to_string(),
        }
    }

    fn read_back(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes).unwrap();
                (file.name().to_string(), bytes)
            })
            .collect()
    }

    #[test]
    fn entries_read_back_identical_and_in_order() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("launchui");
        let lib = temp.path().join("libnode.so.91");
        fs::write(&bin, b"\x7fELF binary").unwrap();
        fs::write(&lib, vec![7u8; 100_000]).unwrap();
        let output = temp.path().join("packages/launchui-v1.0.0-linux-x64.zip");

        let pending = ZipArchiveBuilder
            .start(ArchiveRequest {
                output: output.clone(),
                entries: vec![
                    entry(bin.clone(), "launchui"),
                    entry(lib.clone(), "libnode.so.91"),
                    entry(bin, "app/copy-of-launchui"),
                ],
                compression_level: 9,
            })
            .unwrap();
        let report = pending.wait().unwrap();

        assert_eq!(report.path, output);
        assert_eq!(report.entries, 3);
        assert_eq!(report.size_bytes, fs::metadata(&output).unwrap().len());
        assert_eq!(report.sha256.len(), 64);

        let contents = read_back(&output);
        assert_eq!(contents[0], ("launchui".to_string(), b"\x7fELF binary".to_vec()));
        assert_eq!(contents[1], ("libnode.so.91".to_string(), vec![7u8; 100_000]));
        assert_eq!(contents[2].0, "app/copy-of-launchui");
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn missing_source_discards_partial_archive() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("present");
        fs::write(&present, "x").unwrap();
        let output = temp.path().join("packages/broken.zip");

        let err = ZipArchiveBuilder
            .start(ArchiveRequest {
                output: output.clone(),
                entries: vec![
                    entry(present, "present"),
                    entry(temp.path().join("absent"), "absent"),
                ],
                compression_level: 9,
            })
            .unwrap()
            .wait()
            .unwrap_err();

        assert!(matches!(err, PackError::ArchiveWrite { .. }));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn creates_missing_output_directory() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("a/b/c/empty.zip");

        let report = write_zip(&ArchiveRequest {
            output: output.clone(),
            entries: vec![],
            compression_level: 1,
        });
        // write_zip itself does not create directories; the sink does.
        assert!(report.is_err());

        ZipArchiveBuilder
            .start(ArchiveRequest {
                output: output.clone(),
                entries: vec![],
                compression_level: 1,
            })
            .unwrap()
            .wait()
            .unwrap();
        assert!(output.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn preserves_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("launchui");
        fs::write(&bin, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();
        let output = temp.path().join("exec.zip");

        write_zip(&ArchiveRequest {
            output: output.clone(),
            entries: vec![entry(bin, "launchui")],
            compression_level: 9,
        })
        .unwrap();

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let mode = archive.by_name("launchui").unwrap().unix_mode().unwrap();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("packages/a.zip")),
            PathBuf::from("packages/a.zip.partial")
        );
    }
}
