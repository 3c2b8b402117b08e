//! Decide whether a local copy still matches its remote entry.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use drive_store::RemoteFileMeta;
use tracing::debug;

/// Local modification times observed during one sync pass, keyed by file name.
///
/// Each name is stat'ed at most once per pass; the cache is dropped with the pass.
#[derive(Debug, Default)]
pub struct LocalStateCache {
    mtimes: HashMap<String, Option<DateTime<Utc>>>,
    seen: HashSet<String>,
}

impl LocalStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn modified(&mut self, name: &str, path: &Path) -> Option<DateTime<Utc>> {
        *self
            .mtimes
            .entry(name.to_string())
            .or_insert_with(|| read_mtime(path))
    }

    /// Record that the pass reached an entry called `name`.
    ///
    /// Returns `false` when the name was already seen, i.e. the remote folder
    /// holds several entries that map onto the same local file.
    pub fn note_name(&mut self, name: &str) -> bool {
        self.seen.insert(name.to_string())
    }

    pub fn len(&self) -> usize {
        self.mtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mtimes.is_empty()
    }
}

fn read_mtime(path: &Path) -> Option<DateTime<Utc>> {
    match fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(modified) => Some(DateTime::<Utc>::from(modified)),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "cannot read local modification time");
            None
        }
    }
}

/// `true` when `local_path` exists and its modification time is within
/// `tolerance` of the remote one.
pub fn is_up_to_date(
    local_path: &Path,
    remote: &RemoteFileMeta,
    cache: &mut LocalStateCache,
    tolerance: Duration,
) -> bool {
    if !local_path.exists() {
        return false;
    }
    let Some(local) = cache.modified(&remote.name, local_path) else {
        return false;
    };
    let skew = (local - remote.modified_time).abs();
    match skew.to_std() {
        Ok(skew) => skew <= tolerance,
        Err(_) => false,
    }
}
