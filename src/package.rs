//! Packaging orchestrator.
//!
//! A run moves forward through a fixed sequence of stages:
//!
//! ```text
//! Start -> ResolveVersions -> BuildFileList -> WriteArchive -> Compress -> Done
//!                                                           \-> Skip ---/
//! ```
//!
//! Nothing under the packages directory is touched before `WriteArchive`, so
//! a run that fails while resolving or discovering inputs leaves no archive
//! behind. The secondary compressor only starts once the primary archive's
//! completion handle has resolved.

use fs2::FileExt;
use serde::Serialize;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::archive::filesystem::sha256_file;
use crate::archive::{ArchiveReport, ArchiveRequest, ArchiveSink, SecondaryCompressor, ToolProbe};
use crate::config::PackageConfig;
use crate::error::{PackError, PipelineFailure, Result};
use crate::layout::{plan_entries, ArchiveEntry, LayoutInputs};
use crate::platform::PlatformTarget;
use crate::runtime::resolve_runtime_library;

/// Runtime checkout, relative to the project root.
pub const RUNTIME_DIR: &str = "deps/node";

/// Advisory lock held in the packages directory while archives are written.
pub const LOCK_FILENAME: &str = ".launchui-pack.lock";

/// Where a packaging run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Start,
    ResolveVersions,
    BuildFileList,
    WriteArchive,
    Compress,
    Skip,
    Done,
}

impl Stage {
    /// Position in the pipeline. `Compress` and `Skip` are alternatives.
    fn rank(self) -> u8 {
        match self {
            Stage::Start => 0,
            Stage::ResolveVersions => 1,
            Stage::BuildFileList => 2,
            Stage::WriteArchive => 3,
            Stage::Compress | Stage::Skip => 4,
            Stage::Done => 5,
        }
    }

    /// Whether a run in this stage may move on to `next`.
    pub fn can_advance_to(self, next: Stage) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::ResolveVersions => "resolve-versions",
            Stage::BuildFileList => "build-file-list",
            Stage::WriteArchive => "write-archive",
            Stage::Compress => "compress",
            Stage::Skip => "skip",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What happened to the secondary archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SecondaryArchive {
    Created {
        path: PathBuf,
        size_bytes: u64,
        sha256: String,
    },
    /// The compression tool was not installed.
    Skipped { tool: String },
}

/// The outcome of a successful packaging run.
#[derive(Debug, Clone, Serialize)]
pub struct PackageDescriptor {
    pub target: PlatformTarget,
    pub primary: ArchiveReport,
    pub secondary: SecondaryArchive,
}

impl PackageDescriptor {
    pub fn primary_path(&self) -> &Path {
        &self.primary.path
    }

    pub fn secondary_path(&self) -> Option<&Path> {
        match &self.secondary {
            SecondaryArchive::Created { path, .. } => Some(path),
            SecondaryArchive::Skipped { .. } => None,
        }
    }
}

/// Drives one packaging run for `config.target`.
pub struct Packager<'a> {
    config: &'a PackageConfig,
    sink: &'a dyn ArchiveSink,
    compressor: &'a dyn SecondaryCompressor,
    stage: Stage,
}

impl<'a> Packager<'a> {
    pub fn new(
        config: &'a PackageConfig,
        sink: &'a dyn ArchiveSink,
        compressor: &'a dyn SecondaryCompressor,
    ) -> Self {
        Self {
            config,
            sink,
            compressor,
            stage: Stage::Start,
        }
    }

    /// Resolve inputs and list the archive entries without writing anything.
    pub fn plan(mut self) -> Result<Vec<ArchiveEntry>, PipelineFailure> {
        self.build_file_list()
    }

    /// Produce the primary archive and, when the tool is available, the
    /// secondary one.
    pub fn run(mut self) -> Result<PackageDescriptor, PipelineFailure> {
        let entries = self.build_file_list()?;

        self.advance(Stage::WriteArchive);
        let _lock = lock_packages_dir(&self.config.packages_dir).map_err(|e| self.fail(e))?;
        let primary = self
            .sink
            .start(ArchiveRequest {
                output: self.config.primary_archive(),
                entries,
                compression_level: self.config.compression_level,
            })
            .and_then(|pending| pending.wait())
            .map_err(|e| self.fail(e))?;

        let secondary = match self.compressor.probe().map_err(|e| self.fail(e))? {
            ToolProbe::Missing { tool } => {
                self.advance(Stage::Skip);
                tracing::info!(%tool, "compression tool not found, skipping secondary archive");
                SecondaryArchive::Skipped { tool }
            }
            ToolProbe::Available(_) => {
                self.advance(Stage::Compress);
                let path = self
                    .compressor
                    .recompress(&primary.path)
                    .map_err(|e| self.fail(e))?;
                let (sha256, size_bytes) =
                    sha256_file(&path).map_err(|e| self.fail(PackError::io(&path, e)))?;
                SecondaryArchive::Created {
                    path,
                    size_bytes,
                    sha256,
                }
            }
        };

        self.advance(Stage::Done);
        Ok(PackageDescriptor {
            target: self.config.target.clone(),
            primary,
            secondary,
        })
    }

    fn build_file_list(&mut self) -> Result<Vec<ArchiveEntry>, PipelineFailure> {
        let config = self.config;

        self.advance(Stage::ResolveVersions);
        let runtime = resolve_runtime_library(
            &config.project_root.join(RUNTIME_DIR),
            &config.target,
            config.runtime_lookup,
        )
        .map_err(|e| self.fail(e))?;

        self.advance(Stage::BuildFileList);
        let inputs = LayoutInputs {
            project_root: &config.project_root,
            target: &config.target,
            runtime: &runtime,
            windows: &config.windows,
        };
        let entries = plan_entries(&inputs).map_err(|e| self.fail(e))?;
        tracing::info!(entries = entries.len(), "built file list");
        Ok(entries)
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "stage {} cannot follow {}",
            next,
            self.stage
        );
        tracing::info!(target_platform = %self.config.target, stage = %next, "packaging");
        self.stage = next;
    }

    fn fail(&self, error: PackError) -> PipelineFailure {
        PipelineFailure {
            stage: self.stage,
            target: self.config.target.clone(),
            error,
        }
    }
}

/// Recompress an existing primary archive.
///
/// Only `.zip` inputs are accepted. Returns `None` when the compression tool
/// is not installed.
pub fn recompress_existing(
    compressor: &dyn SecondaryCompressor,
    primary: &Path,
) -> Result<Option<PathBuf>> {
    let is_zip = primary
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if !is_zip {
        return Err(PackError::Compression {
            path: primary.to_path_buf(),
            step: "input",
            reason: "not a .zip archive".to_string(),
        });
    }
    if !primary.is_file() {
        return Err(PackError::io(
            primary,
            std::io::Error::new(std::io::ErrorKind::NotFound, "archive does not exist"),
        ));
    }
    match compressor.recompress(primary) {
        Ok(path) => Ok(Some(path)),
        Err(err) if !err.is_fatal() => {
            tracing::info!("{}, skipping secondary archive", err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Exclusive lock on the packages directory, released on drop.
struct PackagesLock {
    file: File,
}

impl Drop for PackagesLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_packages_dir(dir: &Path) -> Result<PackagesLock> {
    fs::create_dir_all(dir).map_err(|e| PackError::io(dir, e))?;

    // The lock file is left in place; removing it while held would let a
    // second run lock a fresh inode at the same path.
    let path = dir.join(LOCK_FILENAME);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| PackError::io(&path, e))?;

    if file.try_lock_exclusive().is_err() {
        return Err(PackError::Locked { path });
    }
    Ok(PackagesLock { file })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::zip_writer::ZipArchiveBuilder;
    use crate::archive::secondary_archive_path;
    use crate::config::{Overrides, VERSION_VAR};
    use crate::layout::fixtures::write_posix;
    use crate::platform::HostEnvironment;
    use crate::runtime::MODULE_VERSION_HEADER;
    use tempfile::TempDir;

    struct NoTool;

    impl SecondaryCompressor for NoTool {
        fn probe(&self) -> Result<ToolProbe> {
            Ok(ToolProbe::Missing { tool: "7z".into() })
        }

        fn recompress(&self, _primary: &Path) -> Result<PathBuf> {
            Err(PackError::CompressionToolUnavailable { tool: "7z".into() })
        }
    }

    /// Copies the primary archive to its secondary path.
    struct CopyTool;

    impl SecondaryCompressor for CopyTool {
        fn probe(&self) -> Result<ToolProbe> {
            Ok(ToolProbe::Available(PathBuf::from("/usr/bin/true")))
        }

        fn recompress(&self, primary: &Path) -> Result<PathBuf> {
            let secondary = secondary_archive_path(primary);
            fs::copy(primary, &secondary).map_err(|e| PackError::io(&secondary, e))?;
            Ok(secondary)
        }
    }

    fn posix_project(temp: &TempDir) -> PackageConfig {
        let root = temp.path();
        write_posix(root, 91);
        let header = root.join(RUNTIME_DIR).join(MODULE_VERSION_HEADER);
        fs::create_dir_all(header.parent().unwrap()).unwrap();
        fs::write(&header, "#define NODE_MODULE_VERSION 91\n").unwrap();

        let host = HostEnvironment::synthetic("linux", "x64").with_var(VERSION_VAR, "0.1.5");
        PackageConfig::load(root, &host, &Overrides::default()).unwrap()
    }

    #[test]
    fn stages_only_move_forward() {
        assert!(Stage::Start.can_advance_to(Stage::ResolveVersions));
        assert!(Stage::WriteArchive.can_advance_to(Stage::Compress));
        assert!(Stage::WriteArchive.can_advance_to(Stage::Skip));
        assert!(Stage::Skip.can_advance_to(Stage::Done));
        assert!(!Stage::Compress.can_advance_to(Stage::Skip));
        assert!(!Stage::Done.can_advance_to(Stage::Start));
        assert!(!Stage::BuildFileList.can_advance_to(Stage::BuildFileList));
    }

    #[test]
    fn run_without_tool_skips_secondary() {
        let temp = TempDir::new().unwrap();
        let config = posix_project(&temp);

        let descriptor = Packager::new(&config, &ZipArchiveBuilder, &NoTool)
            .run()
            .unwrap();

        assert_eq!(descriptor.primary_path(), config.primary_archive());
        assert!(descriptor.primary_path().is_file());
        assert_eq!(
            descriptor.secondary,
            SecondaryArchive::Skipped { tool: "7z".into() }
        );
        assert!(!secondary_archive_path(&config.primary_archive()).exists());
    }

    #[test]
    fn run_with_tool_records_secondary_digest() {
        let temp = TempDir::new().unwrap();
        let config = posix_project(&temp);

        let descriptor = Packager::new(&config, &ZipArchiveBuilder, &CopyTool)
            .run()
            .unwrap();

        match &descriptor.secondary {
            SecondaryArchive::Created { path, sha256, .. } => {
                assert_eq!(path, &secondary_archive_path(&config.primary_archive()));
                assert_eq!(sha256, &descriptor.primary.sha256);
            }
            other => panic!("expected a secondary archive, got {:?}", other),
        }
    }

    #[test]
    fn plan_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let config = posix_project(&temp);

        let entries = Packager::new(&config, &ZipArchiveBuilder, &NoTool)
            .plan()
            .unwrap();

        assert_eq!(entries[0].destination, "launchui");
        assert!(!config.packages_dir.exists());
    }

    #[test]
    fn unresolvable_runtime_fails_in_resolve_stage() {
        let temp = TempDir::new().unwrap();
        let config = posix_project(&temp);
        fs::remove_file(config.project_root.join(RUNTIME_DIR).join(MODULE_VERSION_HEADER))
            .unwrap();

        let failure = Packager::new(&config, &ZipArchiveBuilder, &NoTool)
            .run()
            .unwrap_err();

        assert_eq!(failure.stage, Stage::ResolveVersions);
        assert_eq!(failure.target, PlatformTarget::new("linux", "x64"));
        assert!(matches!(failure.error, PackError::Resolution { .. }));
        assert!(!config.packages_dir.exists());
    }

    #[test]
    fn held_lock_fails_write_stage() {
        let temp = TempDir::new().unwrap();
        let config = posix_project(&temp);
        let held = lock_packages_dir(&config.packages_dir).unwrap();

        let failure = Packager::new(&config, &ZipArchiveBuilder, &NoTool)
            .run()
            .unwrap_err();

        assert_eq!(failure.stage, Stage::WriteArchive);
        assert!(matches!(failure.error, PackError::Locked { .. }));
        assert!(!config.primary_archive().exists());

        drop(held);
        assert!(Packager::new(&config, &ZipArchiveBuilder, &NoTool)
            .run()
            .is_ok());
    }

    #[test]
    fn recompress_existing_reports_missing_tool_as_none() {
        let temp = TempDir::new().unwrap();
        let zip = temp.path().join("a.zip");
        fs::write(&zip, b"PK").unwrap();

        assert_eq!(recompress_existing(&NoTool, &zip).unwrap(), None);
        assert_eq!(
            recompress_existing(&CopyTool, &zip).unwrap(),
            Some(temp.path().join("a.7z"))
        );
        assert!(recompress_existing(&NoTool, &temp.path().join("absent.zip")).is_err());
    }

    #[test]
    fn recompress_existing_rejects_non_zip_input() {
        let temp = TempDir::new().unwrap();
        let tarball = temp.path().join("launchui.tar.gz");
        fs::write(&tarball, b"\x1f\x8b").unwrap();

        let err = recompress_existing(&CopyTool, &tarball).unwrap_err();

        assert!(matches!(err, PackError::Compression { step: "input", .. }));
        assert!(!temp.path().join("launchui.tar.7z").exists());
    }
}
