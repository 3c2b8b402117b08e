use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use drive_kiosk::config::{
    Configuration, ImageViewer, Overrides, PLACEHOLDER_FOLDER_ID, VideoPlayer,
};
use tempfile::tempdir;

#[test]
fn defaults_match_kiosk_behaviour() {
    let cfg = Configuration::default();
    assert_eq!(cfg.media_dir, PathBuf::from("media"));
    assert_eq!(cfg.sync.folder_id, PLACEHOLDER_FOLDER_ID);
    assert_eq!(cfg.sync.interval, Duration::from_secs(300));
    assert_eq!(cfg.sync.clock_skew_tolerance, Duration::from_secs(1));
    assert_eq!(cfg.playback.slideshow_delay, Duration::from_secs(8));
    assert_eq!(cfg.playback.default_video_timeout, Duration::from_secs(300));
    assert_eq!(cfg.playback.empty_backoff, Duration::from_secs(30));
    assert_eq!(cfg.playback.stop_grace_period, Duration::from_secs(5));
    assert!(cfg.playback.probe_durations);
    assert_eq!(cfg.playback.cycles_per_sync, 1);
    assert_eq!(cfg.playback.image_viewer, ImageViewer::Feh);
    assert_eq!(cfg.playback.video_player, VideoPlayer::Cvlc);
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
media-dir: "/srv/kiosk/media"
sync:
  folder-id: "1AbCdEf"
  credentials-path: "/etc/kiosk/credentials.json"
  interval: 10m
  clock-skew-tolerance: 2s
  report-csv: "/srv/kiosk/report.csv"
playback:
  slideshow-delay: 12s
  default-video-timeout: 2m
  probe-durations: false
  cycles-per-sync: 3
  image-viewer: fbi
  video-player: omxplayer
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.media_dir, PathBuf::from("/srv/kiosk/media"));
    assert_eq!(cfg.sync.folder_id, "1AbCdEf");
    assert_eq!(cfg.sync.interval, Duration::from_secs(600));
    assert_eq!(cfg.sync.clock_skew_tolerance, Duration::from_secs(2));
    assert_eq!(
        cfg.sync.report_csv,
        Some(PathBuf::from("/srv/kiosk/report.csv"))
    );
    assert_eq!(cfg.playback.slideshow_delay, Duration::from_secs(12));
    assert_eq!(cfg.playback.default_video_timeout, Duration::from_secs(120));
    assert!(!cfg.playback.probe_durations);
    assert_eq!(cfg.playback.cycles_per_sync, 3);
    assert_eq!(cfg.playback.image_viewer, ImageViewer::Fbi);
    assert_eq!(cfg.playback.video_player, VideoPlayer::Omxplayer);
    // Unset keys keep their defaults.
    assert_eq!(cfg.playback.empty_backoff, Duration::from_secs(30));
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
media-dir: "/m"
playback:
  slideshow-dely: 8s
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn unknown_player_is_rejected() {
    let yaml = r#"
playback:
  video-player: mplayer
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn overrides_win_over_file_values() {
    let cfg = Configuration::default().with_overrides(Overrides {
        media_dir: Some(PathBuf::from("/tmp/media")),
        folder_id: Some("folder-xyz".to_string()),
        credentials_path: Some(PathBuf::from("/tmp/creds.json")),
        sync_interval: Some(Duration::from_secs(60)),
        slideshow_delay: Some(Duration::from_secs(3)),
        framebuffer: true,
    });
    assert_eq!(cfg.media_dir, PathBuf::from("/tmp/media"));
    assert_eq!(cfg.sync.folder_id, "folder-xyz");
    assert_eq!(cfg.sync.credentials_path, PathBuf::from("/tmp/creds.json"));
    assert_eq!(cfg.sync.interval, Duration::from_secs(60));
    assert_eq!(cfg.playback.slideshow_delay, Duration::from_secs(3));
    assert_eq!(cfg.playback.image_viewer, ImageViewer::Fbi);
}

#[test]
fn empty_overrides_change_nothing() {
    let cfg = Configuration::default().with_overrides(Overrides::default());
    assert_eq!(cfg.media_dir, PathBuf::from("media"));
    assert_eq!(cfg.playback.image_viewer, ImageViewer::Feh);
}

#[test]
fn load_without_path_uses_defaults() {
    let cfg = Configuration::load(None).unwrap();
    assert_eq!(cfg.sync.interval, Duration::from_secs(300));
}

#[test]
fn load_reports_missing_file() {
    let tmp = tempdir().unwrap();
    let err = Configuration::load(Some(tmp.path().join("absent.yaml").as_path())).unwrap_err();
    assert!(format!("{err:#}").contains("absent.yaml"));
}

#[test]
fn placeholder_folder_id_fails_sync_validation() {
    let tmp = tempdir().unwrap();
    let creds = tmp.path().join("credentials.json");
    fs::write(&creds, "{}").unwrap();

    let cfg = Configuration::default().with_overrides(Overrides {
        credentials_path: Some(creds),
        ..Overrides::default()
    });
    let err = cfg.validated_for_sync().unwrap_err();
    assert!(format!("{err:#}").contains("folder-id"));
}

#[test]
fn missing_credentials_fail_sync_validation() {
    let tmp = tempdir().unwrap();
    let cfg = Configuration::default().with_overrides(Overrides {
        folder_id: Some("1AbCdEf".to_string()),
        credentials_path: Some(tmp.path().join("missing.json")),
        ..Overrides::default()
    });
    let err = cfg.validated_for_sync().unwrap_err();
    assert!(format!("{err:#}").contains("credentials-path"));
}

#[test]
fn playback_only_validation_ignores_sync_settings() {
    let cfg = Configuration::default().validated().unwrap();
    assert_eq!(cfg.sync.folder_id, PLACEHOLDER_FOLDER_ID);
}

#[test]
fn complete_sync_configuration_validates() {
    let tmp = tempdir().unwrap();
    let creds = tmp.path().join("credentials.json");
    fs::write(&creds, "{}").unwrap();
    let cfg = Configuration::default()
        .with_overrides(Overrides {
            folder_id: Some("1AbCdEf".to_string()),
            credentials_path: Some(creds),
            ..Overrides::default()
        })
        .validated_for_sync();
    assert!(cfg.is_ok());
}

#[test]
fn zero_durations_are_rejected() {
    let mut cfg = Configuration::default();
    cfg.playback.slideshow_delay = Duration::ZERO;
    assert!(cfg.validated().is_err());

    let mut cfg = Configuration::default();
    cfg.playback.default_video_timeout = Duration::ZERO;
    assert!(cfg.validated().is_err());

    let mut cfg = Configuration::default();
    cfg.playback.cycles_per_sync = 0;
    assert!(cfg.validated().is_err());
}

#[test]
fn example_config_parses() {
    let cfg: Configuration = serde_yaml::from_str(include_str!("../config.example.yaml")).unwrap();
    assert_eq!(cfg.media_dir, PathBuf::from("/var/lib/drive-kiosk/media"));
    assert_eq!(cfg.sync.report_csv, None);
    assert!(cfg.validated().is_ok());
}
