use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use drive_store::{EntryKind, RemoteFileMeta, RemoteStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DownloadError;
use crate::sync::downloader;
use crate::sync::lister::list_folder;
use crate::sync::report::{ReportSink, TracingSink};
use crate::sync::staleness::{LocalStateCache, is_up_to_date};

/// Result of one remote entry during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Downloaded {
        name: String,
        path: PathBuf,
        checksum: Option<String>,
    },
    Skipped {
        name: String,
        path: PathBuf,
        checksum: Option<String>,
    },
    Failed {
        name: String,
        error: String,
    },
}

/// Aggregate of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Local paths that match the remote after the pass, in listing order.
    pub synced_paths: Vec<PathBuf>,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub folders_ignored: usize,
    /// Entries whose name repeats an earlier entry of the same listing.
    pub duplicate_names: usize,
}

impl SyncOutcome {
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Downloaded { path, .. } => {
                self.downloaded += 1;
                self.synced_paths.push(path.clone());
            }
            ItemOutcome::Skipped { path, .. } => {
                self.skipped += 1;
                self.synced_paths.push(path.clone());
            }
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// One-directional mirror of a flat remote folder into a local directory.
pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    sink: Arc<dyn ReportSink>,
    tolerance: Duration,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            sink: Arc::new(TracingSink),
            tolerance: Duration::from_secs(1),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Bring `local_dir` up to date with the direct children of `folder_id`.
    ///
    /// Never fails: listing problems yield an empty outcome, entry problems
    /// are counted as failures.
    #[instrument(skip(self), fields(local_dir = %local_dir.display()))]
    pub async fn sync(&self, folder_id: &str, local_dir: &Path) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        if let Err(err) = tokio::fs::create_dir_all(local_dir).await {
            error!(error = %err, "cannot create media directory");
            self.sink.pass(&outcome);
            return outcome;
        }

        let entries = match list_folder(self.store.as_ref(), folder_id).await {
            Ok(entries) => entries,
            Err(err) => {
                error!(error = %err, "listing remote folder failed");
                self.sink.pass(&outcome);
                return outcome;
            }
        };
        info!(entries = entries.len(), "remote folder listed");

        let mut cache = LocalStateCache::new();
        for entry in &entries {
            match entry.kind() {
                EntryKind::Folder => {
                    debug!(name = %entry.name, "skipping nested folder");
                    outcome.folders_ignored += 1;
                    continue;
                }
                EntryKind::Native => {
                    debug!(name = %entry.name, mime_type = %entry.mime_type, "remote-native document");
                }
                EntryKind::File => {}
            }

            if !cache.note_name(&entry.name) {
                warn!(
                    name = %entry.name,
                    id = %entry.id,
                    "remote folder holds several entries with this name; the local copy will alternate between them"
                );
                outcome.duplicate_names += 1;
            }

            let item = self.sync_entry(entry, local_dir, &mut cache).await;
            self.sink.item(&item);
            outcome.record(&item);
        }

        self.sink.pass(&outcome);
        outcome
    }

    /// [`SyncEngine::sync`], abandoned as soon as `cancel` fires.
    ///
    /// An abandoned transfer leaves a file without the remote timestamp, so
    /// the next pass fetches it again.
    pub async fn sync_cancellable(
        &self,
        folder_id: &str,
        local_dir: &Path,
        cancel: &CancellationToken,
    ) -> Option<SyncOutcome> {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("sync pass interrupted by shutdown");
                None
            }
            outcome = self.sync(folder_id, local_dir) => Some(outcome),
        }
    }

    async fn sync_entry(
        &self,
        entry: &RemoteFileMeta,
        local_dir: &Path,
        cache: &mut LocalStateCache,
    ) -> ItemOutcome {
        let path = match local_path(local_dir, &entry.name) {
            Ok(path) => path,
            Err(err) => {
                return ItemOutcome::Failed {
                    name: entry.name.clone(),
                    error: err.to_string(),
                };
            }
        };

        if is_up_to_date(&path, entry, cache, self.tolerance) {
            return ItemOutcome::Skipped {
                name: entry.name.clone(),
                path,
                checksum: entry.checksum.clone(),
            };
        }

        match downloader::download(self.store.as_ref(), entry, &path).await {
            Ok(_) => ItemOutcome::Downloaded {
                name: entry.name.clone(),
                path,
                checksum: entry.checksum.clone(),
            },
            Err(err) => ItemOutcome::Failed {
                name: entry.name.clone(),
                error: err.to_string(),
            },
        }
    }
}

/// Join `name` onto `dir`, accepting only a single normal path component.
pub fn local_path(dir: &Path, name: &str) -> Result<PathBuf, DownloadError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(dir.join(part)),
        _ => Err(DownloadError::InvalidName(name.to_string())),
    }
}
