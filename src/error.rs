//! Error types for the packaging pipeline.

use std::io;
use std::path::PathBuf;

use crate::layout::ArtifactRole;
use crate::package::Stage;
use crate::platform::PlatformTarget;

/// Errors raised by the individual packaging components.
///
/// Only [`PackError::CompressionToolUnavailable`] is non-fatal; the
/// orchestrator downgrades it to an informational skip.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// The runtime library filename or its module version could not be determined.
    #[error("cannot resolve runtime library under '{}': {reason}", path.display())]
    Resolution { path: PathBuf, reason: String },

    /// A required bundling input is absent.
    #[error("missing {role} '{}'", path.display())]
    MissingArtifact { role: ArtifactRole, path: PathBuf },

    /// Writing the primary archive failed; no partial archive is left behind.
    #[error("failed writing archive '{}': {reason}", path.display())]
    ArchiveWrite { path: PathBuf, reason: String },

    /// The secondary compression tool is not installed.
    #[error("compression tool '{tool}' not found on PATH")]
    CompressionToolUnavailable { tool: String },

    /// Extraction or recompression failed with the tool present.
    #[error("secondary compression of '{}' failed during {step}: {reason}", path.display())]
    Compression {
        path: PathBuf,
        step: &'static str,
        reason: String,
    },

    /// The target architecture has no known redistributable layout.
    #[error("unknown architecture '{arch}' for {os}")]
    UnsupportedArchitecture { os: String, arch: String },

    /// Two artifacts map to the same destination inside the archive.
    #[error("duplicate archive entry '{destination}' ('{}' and '{}')", first.display(), second.display())]
    DuplicateEntry {
        destination: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Another packaging run holds the output directory lock.
    #[error("packages directory is locked by another run: {}", path.display())]
    Locked { path: PathBuf },

    #[error("i/o error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PackError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn resolution(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn archive_write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArchiveWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the pipeline may continue past this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CompressionToolUnavailable { .. })
    }
}

/// A fatal failure of a packaging run, tagged with where it happened.
#[derive(Debug, thiserror::Error)]
#[error("packaging for {target} failed at stage {stage}")]
pub struct PipelineFailure {
    pub stage: Stage,
    pub target: PlatformTarget,
    #[source]
    pub error: PackError,
}

pub type Result<T, E = PackError> = std::result::Result<T, E>;
