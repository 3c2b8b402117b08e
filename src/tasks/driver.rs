use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::sync::SyncEngine;
use crate::tasks::playback::{PlaybackMode, PlaybackScheduler};

/// Counters returned when the driver stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub sync_passes: usize,
    pub cycles: usize,
}

/// Alternates a sync pass with playback cycles until shutdown.
pub struct Driver {
    engine: SyncEngine,
    scheduler: PlaybackScheduler,
    folder_id: String,
    media_dir: PathBuf,
    interval: Duration,
    cycles_per_sync: u32,
}

impl Driver {
    pub fn new(
        engine: SyncEngine,
        scheduler: PlaybackScheduler,
        folder_id: impl Into<String>,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            scheduler,
            folder_id: folder_id.into(),
            media_dir: media_dir.into(),
            interval: Duration::from_secs(300),
            cycles_per_sync: 1,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cycles_per_sync(mut self, cycles: u32) -> Self {
        self.cycles_per_sync = cycles.max(1);
        self
    }

    /// In `once` mode: one sync pass and one single-pass playback cycle.
    #[instrument(skip(self, cancel), fields(folder_id = %self.folder_id))]
    pub async fn run(&mut self, once: bool, cancel: &CancellationToken) -> DriverStats {
        let mode = if once {
            PlaybackMode::SinglePass
        } else {
            PlaybackMode::Continuous
        };
        let mut stats = DriverStats::default();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let Some(outcome) = self
                .engine
                .sync_cancellable(&self.folder_id, &self.media_dir, cancel)
                .await
            else {
                break;
            };
            stats.sync_passes += 1;
            info!(
                downloaded = outcome.downloaded,
                skipped = outcome.skipped,
                failed = outcome.failed,
                "sync finished; starting playback"
            );

            for _ in 0..self.cycles_per_sync {
                if mode == PlaybackMode::Continuous && cancel.is_cancelled() {
                    break;
                }
                let report = self.scheduler.run_cycle(mode, cancel).await;
                stats.cycles += 1;
                if report.cancelled || once {
                    break;
                }
            }

            if once {
                break;
            }

            info!(interval = ?self.interval, "waiting for next sync");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(
            passes = stats.sync_passes,
            cycles = stats.cycles,
            "driver stopped"
        );
        stats
    }
}
