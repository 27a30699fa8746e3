//! Child process execution.
//!
//! External tools run with inherited stdio and block until they exit; a
//! non-zero exit status is an error.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Failure to run an external command.
#[derive(Debug, thiserror::Error)]
pub enum CmdError {
    #[error("'{program}' not found")]
    NotFound { program: String },

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("'{command}' exited with {status}")]
    Failed { command: String, status: ExitStatus },
}

/// Builder for a blocking external command.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Working directory of the child.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Command line for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion with inherited stdio.
    pub fn run(&self) -> Result<ExitStatus, CmdError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }

        tracing::debug!(command = %self.display(), dir = ?self.dir, "running");

        let status = command.status().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                CmdError::NotFound {
                    program: self.program.to_string_lossy().into_owned(),
                }
            } else {
                CmdError::Spawn {
                    command: self.display(),
                    source,
                }
            }
        })?;

        if !status.success() {
            return Err(CmdError::Failed {
                command: self.display(),
                status,
            });
        }
        Ok(status)
    }
}
