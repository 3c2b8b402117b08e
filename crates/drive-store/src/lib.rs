//! Remote folder store used by the kiosk sync engine.
//!
//! The sync engine only depends on [`RemoteStore`] and [`RemoteFileMeta`];
//! [`DriveClient`] is the Google Drive v3 implementation shipped with the
//! kiosk binary.

pub mod auth;
pub mod client;
pub mod error;
pub mod store;
pub mod types;

pub use auth::{Credentials, TokenProvider};
pub use client::DriveClient;
pub use error::{RemoteError, Result};
pub use store::{ByteStream, RemoteStore};
pub use types::{EntryKind, RemoteFileMeta, RemoteFilePage, FOLDER_MIME_TYPE};
