//! Incremental mirroring of a remote folder into the media directory.

pub mod downloader;
pub mod engine;
pub mod lister;
pub mod report;
pub mod staleness;

pub use engine::{ItemOutcome, SyncEngine, SyncOutcome};
