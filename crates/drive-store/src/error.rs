use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the remote store.
///
/// Every variant is recoverable from the kiosk's point of view: a failed
/// listing turns the current sync pass into a no-op and a failed download
/// only affects the entry being transferred.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The credentials file is missing, unreadable or malformed.
    #[error("invalid credentials in {}: {message}", .path.display())]
    Credentials { path: PathBuf, message: String },

    /// The token endpoint rejected the credentials or could not sign them.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The API answered with a non-success status.
    #[error("Google Drive API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Transport level failure (DNS, TLS, connection reset, body stream).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with a body we could not decode.
    #[error("failed to parse API response: {0}")]
    Parse(String),

    /// A listing page handed back the token it was requested with.
    #[error("pagination did not advance past page token {0}")]
    StalledPagination(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;
