use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ImageViewer, PlaybackSettings, VideoPlayer};
use crate::error::ProcessError;
use crate::media::{MediaSet, classify};
use crate::platform::probe::DurationProbe;
use crate::platform::process::{CommandSpec, Launcher, RunOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    /// One images step and one videos step, then return.
    SinglePass,
    /// Cycle until cancelled.
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ShowingImages,
    PlayingVideos,
}

/// What happened during one presentation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub images_shown: usize,
    pub videos_played: usize,
    /// Videos stopped because their time budget ran out.
    pub videos_timed_out: usize,
    pub failures: usize,
    /// The media directory held nothing playable.
    pub empty: bool,
    /// The cycle ended early or a player was stopped by cancellation.
    pub cancelled: bool,
}

/// Turns the media directory into slideshow and video player invocations.
pub struct PlaybackScheduler {
    media_dir: PathBuf,
    settings: PlaybackSettings,
    launcher: Arc<dyn Launcher>,
    prober: Arc<dyn DurationProbe>,
    phase: Phase,
}

impl PlaybackScheduler {
    pub fn new(
        media_dir: impl Into<PathBuf>,
        settings: PlaybackSettings,
        launcher: Arc<dyn Launcher>,
        prober: Arc<dyn DurationProbe>,
    ) -> Self {
        Self {
            media_dir: media_dir.into(),
            settings,
            launcher,
            prober,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Play cycles until `cancel` fires (continuous) or once (single pass).
    #[instrument(skip(self, cancel), fields(media_dir = %self.media_dir.display()))]
    pub async fn run(&mut self, mode: PlaybackMode, cancel: &CancellationToken) {
        loop {
            let report = self.run_cycle(mode, cancel).await;
            if mode == PlaybackMode::SinglePass || cancel.is_cancelled() || report.cancelled {
                break;
            }
            info!("cycle complete; starting over");
        }
        info!("playback stopped");
    }

    /// Play every image, then every video, once.
    pub async fn run_cycle(&mut self, mode: PlaybackMode, cancel: &CancellationToken) -> CycleReport {
        let continuous = mode == PlaybackMode::Continuous;
        let mut report = CycleReport::default();

        let media = classify(&self.media_dir);
        if media.is_empty() {
            report.empty = true;
            warn!(media_dir = %self.media_dir.display(), "no media files available");
            if continuous {
                info!(backoff = ?self.settings.empty_backoff, "waiting before checking again");
                tokio::select! {
                    _ = cancel.cancelled() => report.cancelled = true,
                    _ = tokio::time::sleep(self.settings.empty_backoff) => {}
                }
            }
            return report;
        }

        if continuous && cancel.is_cancelled() {
            report.cancelled = true;
            return report;
        }

        self.phase = Phase::ShowingImages;
        self.show_images(&media, cancel, &mut report).await;

        if continuous && cancel.is_cancelled() {
            report.cancelled = true;
            self.phase = Phase::Idle;
            return report;
        }

        self.phase = Phase::PlayingVideos;
        self.play_videos(&media, continuous, cancel, &mut report).await;

        self.phase = Phase::Idle;
        debug!(?report, "cycle finished");
        report
    }

    async fn show_images(&self, media: &MediaSet, cancel: &CancellationToken, report: &mut CycleReport) {
        if media.images.is_empty() {
            info!("no images found to display");
            return;
        }

        let viewer = self.settings.image_viewer;
        let spec = slideshow_command(viewer, self.settings.slideshow_delay, &media.images);
        info!(%viewer, images = media.images.len(), "starting image slideshow");

        match self.launcher.run(&spec, None, cancel).await {
            Ok(RunOutcome::Exited) => report.images_shown = media.images.len(),
            Ok(RunOutcome::TimedOut { .. }) => report.images_shown = media.images.len(),
            Ok(RunOutcome::Cancelled { stop }) => {
                info!(?stop, "slideshow stopped by cancellation");
                report.cancelled = true;
            }
            Err(err @ ProcessError::NotFound { .. }) => {
                error!(error = %err, "image viewer unavailable; skipping images");
                report.failures += 1;
            }
            Err(err) => {
                error!(error = %err, "slideshow failed");
                report.failures += 1;
            }
        }
    }

    async fn play_videos(
        &self,
        media: &MediaSet,
        continuous: bool,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) {
        if media.videos.is_empty() {
            info!("no videos found to play");
            return;
        }

        let player = self.settings.video_player;
        for video in &media.videos {
            if continuous && cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let timeout = video_timeout(
                player,
                self.prober.probe(video).await,
                self.settings.default_video_timeout,
            );
            let spec = video_command(player, video);
            info!(video = %display_name(video), %player, ?timeout, "playing video");

            match self.launcher.run(&spec, Some(timeout), cancel).await {
                Ok(RunOutcome::Exited) => report.videos_played += 1,
                Ok(RunOutcome::TimedOut { stop }) => {
                    // Looping players always end here.
                    if player == VideoPlayer::Cvlc {
                        warn!(video = %display_name(video), ?timeout, "video playback timed out");
                    } else {
                        debug!(video = %display_name(video), ?stop, "video time budget reached");
                    }
                    report.videos_played += 1;
                    report.videos_timed_out += 1;
                }
                Ok(RunOutcome::Cancelled { stop }) => {
                    info!(video = %display_name(video), ?stop, "video stopped by cancellation");
                    report.cancelled = true;
                    if continuous {
                        break;
                    }
                }
                Err(err @ ProcessError::NotFound { .. }) => {
                    error!(error = %err, "video player unavailable; skipping videos");
                    report.failures += 1;
                    break;
                }
                Err(err) => {
                    error!(video = %display_name(video), error = %err, "video playback failed");
                    report.failures += 1;
                }
            }
        }
    }
}

/// One slideshow process covering all `images`, each shown for `delay`.
pub fn slideshow_command(viewer: ImageViewer, delay: Duration, images: &[PathBuf]) -> CommandSpec {
    let seconds = delay.as_secs().max(1).to_string();
    let spec = match viewer {
        ImageViewer::Feh => CommandSpec::new("feh").args([
            "--fullscreen",
            "--hide-pointer",
            "--auto-zoom",
            "--quiet",
            "--no-fehbg",
            "--slideshow-delay",
            seconds.as_str(),
            "--cycle-once",
        ]),
        ImageViewer::Fbi => CommandSpec::new("fbi").args([
            "--noverbose",
            "--autozoom",
            "--timeout",
            seconds.as_str(),
            "--once",
        ]),
    };
    spec.args(images)
}

/// Extra time given to players that end by themselves, covering startup.
pub const PLAYER_EXIT_SLACK: Duration = Duration::from_secs(5);

/// Time budget for one video run.
///
/// A self-exiting player must finish before its bound expires, so it gets the
/// probed duration plus [`PLAYER_EXIT_SLACK`]. A looping player is stopped
/// exactly at the end of the probed duration.
pub fn video_timeout(
    player: VideoPlayer,
    probed: Option<Duration>,
    fallback: Duration,
) -> Duration {
    match (player, probed) {
        (_, None) => fallback,
        (VideoPlayer::Cvlc, Some(duration)) => duration + PLAYER_EXIT_SLACK,
        (VideoPlayer::Omxplayer, Some(duration)) => duration,
    }
}

pub fn video_command(player: VideoPlayer, video: &Path) -> CommandSpec {
    match player {
        VideoPlayer::Cvlc => CommandSpec::new("cvlc")
            .args([
                "--fullscreen",
                "--no-video-title-show",
                "--play-and-exit",
                "--quiet",
            ])
            .arg(video),
        VideoPlayer::Omxplayer => CommandSpec::new("omxplayer")
            .args(["--no-osd", "--loop"])
            .arg(video)
            .quit_input("q"),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(spec: &CommandSpec) -> Vec<String> {
        spec.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn feh_slideshow_cycles_once_over_all_images() {
        let images = vec![PathBuf::from("/m/B.JPG"), PathBuf::from("/m/a.png")];
        let spec = slideshow_command(ImageViewer::Feh, Duration::from_secs(8), &images);
        assert_eq!(spec.program, "feh");
        assert_eq!(
            args(&spec),
            [
                "--fullscreen",
                "--hide-pointer",
                "--auto-zoom",
                "--quiet",
                "--no-fehbg",
                "--slideshow-delay",
                "8",
                "--cycle-once",
                "/m/B.JPG",
                "/m/a.png"
            ]
        );
        assert!(spec.quit_input.is_none());
    }

    #[test]
    fn fbi_slideshow_uses_timeout_flag() {
        let images = vec![PathBuf::from("/m/a.png")];
        let spec = slideshow_command(ImageViewer::Fbi, Duration::from_secs(12), &images);
        assert_eq!(spec.program, "fbi");
        assert_eq!(
            args(&spec),
            ["--noverbose", "--autozoom", "--timeout", "12", "--once", "/m/a.png"]
        );
    }

    #[test]
    fn omxplayer_is_stopped_through_stdin() {
        let spec = video_command(VideoPlayer::Omxplayer, Path::new("/m/clip.mp4"));
        assert_eq!(args(&spec), ["--no-osd", "--loop", "/m/clip.mp4"]);
        assert_eq!(spec.quit_input.as_deref(), Some(&b"q"[..]));

        let spec = video_command(VideoPlayer::Cvlc, Path::new("/m/clip.mp4"));
        assert_eq!(spec.program, "cvlc");
        assert!(args(&spec).contains(&"--play-and-exit".to_string()));
        assert!(spec.quit_input.is_none());
    }
}
