use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// Folder id shipped in sample configs; never a real Drive folder.
pub const PLACEHOLDER_FOLDER_ID: &str = "REPLACE_ME_WITH_FOLDER_ID";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Flat directory mirrored from the remote folder and played back.
    pub media_dir: PathBuf,
    /// Remote folder mirroring.
    pub sync: SyncSettings,
    /// Slideshow and video playback.
    pub playback: PlaybackSettings,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("media"),
            sync: SyncSettings::default(),
            playback: PlaybackSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Drive folder whose direct children are mirrored.
    pub folder_id: String,
    /// Service-account, authorized-user or access-token JSON.
    pub credentials_path: PathBuf,
    /// Pause between the end of one playback round and the next sync pass.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Maximum local/remote modification time difference still treated as equal.
    #[serde(with = "humantime_serde")]
    pub clock_skew_tolerance: Duration,
    /// Optional CSV file receiving one row per synced entry.
    pub report_csv: Option<PathBuf>,
}

impl SyncSettings {
    const fn default_interval() -> Duration {
        Duration::from_secs(300)
    }

    const fn default_clock_skew_tolerance() -> Duration {
        Duration::from_secs(1)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.folder_id.trim().is_empty() && self.folder_id != PLACEHOLDER_FOLDER_ID,
            "sync.folder-id must be set to a Google Drive folder id"
        );
        ensure!(
            self.credentials_path.is_file(),
            "sync.credentials-path {} does not exist",
            self.credentials_path.display()
        );
        ensure!(
            self.interval > Duration::ZERO,
            "sync.interval must be positive"
        );
        if let Some(report) = &self.report_csv {
            ensure!(
                report.file_name().is_some(),
                "sync.report-csv must include a file name"
            );
        }
        Ok(())
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            folder_id: PLACEHOLDER_FOLDER_ID.to_string(),
            credentials_path: PathBuf::from("credentials.json"),
            interval: Self::default_interval(),
            clock_skew_tolerance: Self::default_clock_skew_tolerance(),
            report_csv: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PlaybackSettings {
    /// How long each image stays on screen.
    #[serde(with = "humantime_serde")]
    pub slideshow_delay: Duration,
    /// Upper bound for a video whose length cannot be probed.
    #[serde(with = "humantime_serde")]
    pub default_video_timeout: Duration,
    /// Wait before re-scanning an empty media directory.
    #[serde(with = "humantime_serde")]
    pub empty_backoff: Duration,
    /// Time a player gets to exit after a graceful stop before it is killed.
    #[serde(with = "humantime_serde")]
    pub stop_grace_period: Duration,
    /// Ask ffprobe for video lengths.
    pub probe_durations: bool,
    /// Playback cycles between two sync passes.
    pub cycles_per_sync: u32,
    pub image_viewer: ImageViewer,
    pub video_player: VideoPlayer,
}

impl PlaybackSettings {
    const fn default_slideshow_delay() -> Duration {
        Duration::from_secs(8)
    }

    const fn default_video_timeout() -> Duration {
        Duration::from_secs(300)
    }

    const fn default_empty_backoff() -> Duration {
        Duration::from_secs(30)
    }

    const fn default_stop_grace_period() -> Duration {
        Duration::from_secs(5)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.slideshow_delay >= Duration::from_secs(1),
            "playback.slideshow-delay must be at least one second"
        );
        ensure!(
            self.default_video_timeout > Duration::ZERO,
            "playback.default-video-timeout must be positive"
        );
        ensure!(
            self.empty_backoff > Duration::ZERO,
            "playback.empty-backoff must be positive"
        );
        ensure!(
            self.cycles_per_sync >= 1,
            "playback.cycles-per-sync must be >= 1"
        );
        Ok(())
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            slideshow_delay: Self::default_slideshow_delay(),
            default_video_timeout: Self::default_video_timeout(),
            empty_backoff: Self::default_empty_backoff(),
            stop_grace_period: Self::default_stop_grace_period(),
            probe_durations: true,
            cycles_per_sync: 1,
            image_viewer: ImageViewer::default(),
            video_player: VideoPlayer::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageViewer {
    /// X11 slideshow viewer.
    #[default]
    Feh,
    /// Linux framebuffer viewer.
    Fbi,
}

impl fmt::Display for ImageViewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageViewer::Feh => "feh",
            ImageViewer::Fbi => "fbi",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoPlayer {
    /// VLC without interface; exits when the video ends.
    #[default]
    Cvlc,
    /// Raspberry Pi hardware player; loops until told to quit.
    Omxplayer,
}

impl fmt::Display for VideoPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VideoPlayer::Cvlc => "cvlc",
            VideoPlayer::Omxplayer => "omxplayer",
        })
    }
}

/// Values supplied on the command line or through the environment.
///
/// Anything set here wins over the YAML file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub media_dir: Option<PathBuf>,
    pub folder_id: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub sync_interval: Option<Duration>,
    pub slideshow_delay: Option<Duration>,
    /// Switch the image viewer to the framebuffer backend.
    pub framebuffer: bool,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Load `path` when given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_yaml_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display())),
            None => Ok(Self::default()),
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        let Overrides {
            media_dir,
            folder_id,
            credentials_path,
            sync_interval,
            slideshow_delay,
            framebuffer,
        } = overrides;

        if let Some(dir) = media_dir {
            self.media_dir = dir;
        }
        if let Some(id) = folder_id {
            self.sync.folder_id = id;
        }
        if let Some(path) = credentials_path {
            self.sync.credentials_path = path;
        }
        if let Some(interval) = sync_interval {
            self.sync.interval = interval;
        }
        if let Some(delay) = slideshow_delay {
            self.playback.slideshow_delay = delay;
        }
        if framebuffer {
            self.playback.image_viewer = ImageViewer::Fbi;
        }
        self
    }

    /// Validate invariants shared by every subcommand.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.media_dir.as_os_str().is_empty(),
            "media-dir must not be empty"
        );
        self.playback
            .validate()
            .context("invalid playback configuration")?;
        Ok(self)
    }

    /// Validate what a sync pass additionally needs: a folder and credentials.
    pub fn validated_for_sync(self) -> Result<Self> {
        let cfg = self.validated()?;
        cfg.sync.validate().context("invalid sync configuration")?;
        Ok(cfg)
    }
}
