//! Receivers of per-entry outcomes and per-pass summaries.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use crate::sync::engine::{ItemOutcome, SyncOutcome};

pub trait ReportSink: Send + Sync {
    fn item(&self, outcome: &ItemOutcome);
    fn pass(&self, outcome: &SyncOutcome);
}

/// Structured log lines through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn item(&self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Downloaded { name, path, .. } => {
                info!(%name, path = %path.display(), "downloaded")
            }
            ItemOutcome::Skipped { name, .. } => info!(%name, "up to date; skipped"),
            ItemOutcome::Failed { name, error } => warn!(%name, %error, "download failed"),
        }
    }

    fn pass(&self, outcome: &SyncOutcome) {
        info!(
            downloaded = outcome.downloaded,
            skipped = outcome.skipped,
            failed = outcome.failed,
            folders_ignored = outcome.folders_ignored,
            duplicate_names = outcome.duplicate_names,
            synced = outcome.synced_paths.len(),
            "sync pass complete"
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ReportSink for NoopSink {
    fn item(&self, _outcome: &ItemOutcome) {}
    fn pass(&self, _outcome: &SyncOutcome) {}
}

/// Appends one spreadsheet row per entry to a CSV file.
///
/// Columns: `timestamp,status,name,path,checksum,error`. The header is written
/// when the file is created.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

const CSV_HEADER: &str = "timestamp,status,name,path,checksum,error";

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, fields: [&str; 6]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut row = String::new();
        if file.metadata()?.len() == 0 {
            row.push_str(CSV_HEADER);
            row.push('\n');
        }
        let line = fields
            .iter()
            .map(|field| csv_field(field))
            .collect::<Vec<_>>()
            .join(",");
        row.push_str(&line);
        row.push('\n');
        file.write_all(row.as_bytes())
    }
}

impl ReportSink for CsvSink {
    fn item(&self, outcome: &ItemOutcome) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let result = match outcome {
            ItemOutcome::Downloaded {
                name,
                path,
                checksum,
            } => self.append([
                &timestamp,
                "downloaded",
                name,
                &path.to_string_lossy(),
                checksum.as_deref().unwrap_or(""),
                "",
            ]),
            ItemOutcome::Skipped {
                name,
                path,
                checksum,
            } => self.append([
                &timestamp,
                "skipped",
                name,
                &path.to_string_lossy(),
                checksum.as_deref().unwrap_or(""),
                "",
            ]),
            ItemOutcome::Failed { name, error } => {
                self.append([&timestamp, "failed", name, "", "", error])
            }
        };
        if let Err(err) = result {
            warn!(path = %self.path.display(), error = %err, "failed to append sync report row");
        }
    }

    fn pass(&self, _outcome: &SyncOutcome) {}
}

/// Forwards every call to each wrapped sink in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ReportSink for FanoutSink {
    fn item(&self, outcome: &ItemOutcome) {
        for sink in &self.sinks {
            sink.item(outcome);
        }
    }

    fn pass(&self, outcome: &SyncOutcome) {
        for sink in &self.sinks {
            sink.pass(outcome);
        }
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
