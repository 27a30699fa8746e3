//! Secondary `.7z` package through the external `7z` tool.
//!
//! The primary zip is extracted into a fresh staging directory and its
//! contents recompressed as a solid LZMA2 archive next to it. The staging
//! directory is removed whether or not either step succeeds.

use std::fs;
use std::path::{Path, PathBuf};

use super::filesystem::{remove_file_if_exists, RemoveOutcome};
use super::{secondary_archive_path, SecondaryCompressor, ToolProbe};
use crate::error::{PackError, Result};
use crate::process::Cmd;

/// Prefix of the temporary staging directory.
pub const STAGING_PREFIX: &str = "launchui-stage-";

/// LZMA2, maximum level, 64 fast bytes, 256 MiB dictionary, solid.
pub const LZMA2_ARGS: &[&str] = &["-m0=lzma2", "-mx=9", "-mfb=64", "-md=256m", "-ms=on"];

/// `7z`-backed secondary compressor.
#[derive(Debug, Clone)]
pub struct SevenZip {
    program: String,
    staging_parent: Option<PathBuf>,
}

impl SevenZip {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            staging_parent: None,
        }
    }

    /// Create staging directories under `dir` instead of the system temp dir.
    pub fn staging_in(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_parent = Some(dir.into());
        self
    }

    fn staging_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let staging = match &self.staging_parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };
        staging.map_err(|e| PackError::Compression {
            path: self
                .staging_parent
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            step: "stage",
            reason: format!("creating staging directory: {}", e),
        })
    }

    fn extract_and_pack(
        &self,
        tool: &Path,
        primary: &Path,
        secondary: &Path,
        staging: &Path,
    ) -> Result<()> {
        Cmd::new(tool)
            .arg("x")
            .arg_path(primary)
            .dir(staging)
            .run()
            .map_err(|e| PackError::Compression {
                path: primary.to_path_buf(),
                step: "extract",
                reason: e.to_string(),
            })?;

        let packed = Cmd::new(tool)
            .arg("a")
            .args(LZMA2_ARGS)
            .arg_path(secondary)
            .arg(".")
            .dir(staging)
            .run();

        if let Err(e) = packed {
            let _ = remove_file_if_exists(secondary);
            return Err(PackError::Compression {
                path: primary.to_path_buf(),
                step: "recompress",
                reason: e.to_string(),
            });
        }
        Ok(())
    }
}

impl SecondaryCompressor for SevenZip {
    fn probe(&self) -> Result<ToolProbe> {
        match which::which(&self.program) {
            Ok(path) => Ok(ToolProbe::Available(path)),
            Err(which::Error::CannotFindBinaryPath) => Ok(ToolProbe::Missing {
                tool: self.program.clone(),
            }),
            Err(e) => Err(PackError::Compression {
                path: PathBuf::from(&self.program),
                step: "probe",
                reason: e.to_string(),
            }),
        }
    }

    fn recompress(&self, primary: &Path) -> Result<PathBuf> {
        let tool = match self.probe()? {
            ToolProbe::Available(path) => path,
            ToolProbe::Missing { tool } => {
                return Err(PackError::CompressionToolUnavailable { tool })
            }
        };

        // The tool runs inside the staging directory.
        let primary = fs::canonicalize(primary).map_err(|e| PackError::io(primary, e))?;
        let secondary = secondary_archive_path(&primary);

        tracing::info!(archive = %secondary.display(), "creating secondary archive");

        if remove_file_if_exists(&secondary).map_err(|e| PackError::io(&secondary, e))?
            == RemoveOutcome::Removed
        {
            tracing::debug!(archive = %secondary.display(), "removed previous secondary archive");
        }

        let staging = self.staging_dir()?;
        let staging_path = staging.path().to_path_buf();
        let outcome = self.extract_and_pack(&tool, &primary, &secondary, &staging_path);
        let cleanup = staging.close();

        outcome?;
        cleanup.map_err(|e| PackError::Compression {
            path: staging_path,
            step: "cleanup",
            reason: e.to_string(),
        })?;

        Ok(secondary)
    }
}
