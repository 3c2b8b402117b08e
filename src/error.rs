use std::path::PathBuf;
use std::time::Duration;

use drive_store::RemoteError;
use thiserror::Error;

/// Failure to mirror a single remote entry. Never aborts a sync pass.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Opening or reading the remote content failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Creating, writing or stamping the local file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote name cannot be used as a single local path component.
    #[error("refusing to write entry with unsafe name {0:?}")]
    InvalidName(String),
}

impl DownloadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure to run an external program.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable is not installed or not on `PATH`.
    #[error("command not found: {program}")]
    NotFound { program: String },

    /// The program ran to completion but reported failure.
    #[error("{program} exited with status {}", exit_status(.code))]
    Failed { program: String, code: Option<i32> },

    /// A captured command did not finish in time.
    #[error("{program} did not finish within {}", elapsed(.after))]
    TimedOut { program: String, after: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

fn elapsed(after: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*after)
}

impl ProcessError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcessError::NotFound { .. })
    }
}
