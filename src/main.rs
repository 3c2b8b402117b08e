//! Binary entrypoint for drive-kiosk.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use drive_kiosk::config::{Configuration, Overrides};
use drive_kiosk::platform::probe::{DurationProbe, FfprobeProber, NoProbe};
use drive_kiosk::platform::process::ProcessRunner;
use drive_kiosk::sync::SyncEngine;
use drive_kiosk::sync::report::{CsvSink, FanoutSink, TracingSink};
use drive_kiosk::tasks::driver::Driver;
use drive_kiosk::tasks::playback::{PlaybackMode, PlaybackScheduler};
use drive_store::{Credentials, DriveClient};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

#[derive(Debug, Parser)]
#[command(
    name = "drive-kiosk",
    version,
    about = "Mirror a Google Drive folder and loop its media on a display"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sync, play, wait, repeat.
    Run {
        #[command(flatten)]
        media: MediaArgs,
        #[command(flatten)]
        remote: RemoteArgs,
        #[command(flatten)]
        display: DisplayArgs,
    },
    /// Run a single sync pass and exit.
    Sync {
        #[command(flatten)]
        media: MediaArgs,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Play the media directory without syncing.
    Play {
        #[command(flatten)]
        media: MediaArgs,
        #[command(flatten)]
        display: DisplayArgs,
    },
}

#[derive(Debug, Args)]
struct MediaArgs {
    /// Local directory holding the mirrored media
    #[arg(long, env = "MEDIA_DIR", value_name = "DIR")]
    media_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RemoteArgs {
    /// Google Drive folder to mirror
    #[arg(long, env = "GDRIVE_FOLDER_ID", value_name = "ID")]
    folder_id: Option<String>,

    /// Service account or authorized user JSON
    #[arg(long, env = "CREDENTIALS_PATH", value_name = "FILE")]
    credentials: Option<PathBuf>,

    /// Seconds to wait between sync passes
    #[arg(long, env = "SYNC_INTERVAL_SECONDS", value_name = "SECONDS")]
    sync_interval: Option<u64>,
}

#[derive(Debug, Args)]
struct DisplayArgs {
    /// Seconds each image stays on screen
    #[arg(long, env = "SLIDESHOW_DELAY", value_name = "SECONDS")]
    slideshow_delay: Option<u64>,

    /// Play a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Use the framebuffer image viewer (fbi) instead of feh
    #[arg(long)]
    framebuffer: bool,
}

impl MediaArgs {
    fn apply(&self, overrides: &mut Overrides) {
        overrides.media_dir = self.media_dir.clone();
    }
}

impl RemoteArgs {
    fn apply(&self, overrides: &mut Overrides) {
        overrides.folder_id = self.folder_id.clone();
        overrides.credentials_path = self.credentials.clone();
        overrides.sync_interval = self.sync_interval.map(Duration::from_secs);
    }
}

impl DisplayArgs {
    fn apply(&self, overrides: &mut Overrides) {
        overrides.slideshow_delay = self.slideshow_delay.map(Duration::from_secs);
        overrides.framebuffer = self.framebuffer;
    }
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("drive_kiosk={level}").parse()?)
        .add_directive(format!("drive_store={level}").parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(cli.verbose) {
        eprintln!("failed to initialise logging: {err:#}");
        std::process::exit(1);
    }
    if let Err(err) = try_main(cli).await {
        error!(error = ?err, "drive-kiosk exited with error");
        std::process::exit(1);
    }
}

async fn try_main(cli: Cli) -> Result<()> {
    let mut overrides = Overrides::default();
    match &cli.command {
        Commands::Run {
            media,
            remote,
            display,
        } => {
            media.apply(&mut overrides);
            remote.apply(&mut overrides);
            display.apply(&mut overrides);
        }
        Commands::Sync { media, remote } => {
            media.apply(&mut overrides);
            remote.apply(&mut overrides);
        }
        Commands::Play { media, display } => {
            media.apply(&mut overrides);
            display.apply(&mut overrides);
        }
    }

    let cfg = Configuration::load(cli.config.as_deref())?.with_overrides(overrides);
    let cfg = match cli.command {
        Commands::Play { .. } => cfg.validated(),
        _ => cfg.validated_for_sync(),
    }
    .context("invalid configuration values")?;
    info!(media_dir = %cfg.media_dir.display(), "configuration loaded");

    let cancel = CancellationToken::new();
    spawn_signal_watchers(&cancel);

    match cli.command {
        Commands::Run { display, .. } => {
            let engine = build_engine(&cfg)?;
            let scheduler = build_scheduler(&cfg);
            let mut driver = Driver::new(engine, scheduler, &cfg.sync.folder_id, &cfg.media_dir)
                .with_interval(cfg.sync.interval)
                .with_cycles_per_sync(cfg.playback.cycles_per_sync);
            driver.run(display.once, &cancel).await;
        }
        Commands::Sync { .. } => {
            let engine = build_engine(&cfg)?;
            if let Some(outcome) = engine
                .sync_cancellable(&cfg.sync.folder_id, &cfg.media_dir, &cancel)
                .await
            {
                info!(
                    downloaded = outcome.downloaded,
                    skipped = outcome.skipped,
                    failed = outcome.failed,
                    "sync complete"
                );
            }
        }
        Commands::Play { display, .. } => {
            tokio::fs::create_dir_all(&cfg.media_dir)
                .await
                .with_context(|| format!("failed to create {}", cfg.media_dir.display()))?;
            let mode = if display.once {
                PlaybackMode::SinglePass
            } else {
                PlaybackMode::Continuous
            };
            build_scheduler(&cfg).run(mode, &cancel).await;
        }
    }

    Ok(())
}

fn build_engine(cfg: &Configuration) -> Result<SyncEngine> {
    let credentials = Credentials::from_file(&cfg.sync.credentials_path)
        .context("failed to load Google credentials")?;
    let client = DriveClient::new(credentials).context("failed to build Drive client")?;

    let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
    if let Some(path) = &cfg.sync.report_csv {
        info!(path = %path.display(), "writing sync report rows");
        sink = sink.with(Arc::new(CsvSink::new(path)));
    }

    Ok(SyncEngine::new(Arc::new(client))
        .with_sink(Arc::new(sink))
        .with_tolerance(cfg.sync.clock_skew_tolerance))
}

fn build_scheduler(cfg: &Configuration) -> PlaybackScheduler {
    let runner = ProcessRunner::new(cfg.playback.stop_grace_period);
    let prober: Arc<dyn DurationProbe> = if cfg.playback.probe_durations {
        Arc::new(FfprobeProber::new(runner.clone()))
    } else {
        Arc::new(NoProbe)
    };
    PlaybackScheduler::new(
        cfg.media_dir.clone(),
        cfg.playback.clone(),
        Arc::new(runner),
        prober,
    )
}

fn spawn_signal_watchers(cancel: &CancellationToken) {
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sigterm.recv() => {
                            info!("SIGTERM received; initiating shutdown");
                            cancel.cancel();
                        }
                    }
                }
                Err(err) => warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }
}
