use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ProcessError;
use crate::platform::process::{CommandSpec, ProcessRunner};

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Best-effort lookup of a video's playing time.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn probe(&self, video: &Path) -> Option<Duration>;
}

/// Asks `ffprobe` for the container duration.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    program: String,
    runner: ProcessRunner,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(runner: ProcessRunner) -> Self {
        Self {
            program: "ffprobe".to_string(),
            runner,
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, video: &Path) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args([
                "-v",
                "error",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                "-show_entries",
                "format=duration",
            ])
            .arg(video)
    }
}

#[async_trait]
impl DurationProbe for FfprobeProber {
    async fn probe(&self, video: &Path) -> Option<Duration> {
        let spec = self.command(video);
        match self.runner.capture(&spec, self.timeout).await {
            Ok(output) => {
                let duration = parse_duration_output(&output);
                if duration.is_none() {
                    debug!(video = %video.display(), output = %output.trim(), "unusable probe output");
                }
                duration
            }
            Err(ProcessError::NotFound { program }) => {
                debug!(%program, "duration probe unavailable");
                None
            }
            Err(err) => {
                warn!(video = %video.display(), error = %err, "duration probe failed");
                None
            }
        }
    }
}

/// Prober used when probing is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

#[async_trait]
impl DurationProbe for NoProbe {
    async fn probe(&self, _video: &Path) -> Option<Duration> {
        None
    }
}

/// Parse the seconds value printed by ffprobe; only positive finite values count.
pub fn parse_duration_output(output: &str) -> Option<Duration> {
    let seconds: f64 = output.lines().next()?.trim().parse().ok()?;
    if seconds.is_finite() && seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fractional_seconds() {
        assert_eq!(
            parse_duration_output("12.500000\n"),
            Some(Duration::from_millis(12_500))
        );
    }

    #[test]
    fn rejects_unusable_output() {
        assert_eq!(parse_duration_output(""), None);
        assert_eq!(parse_duration_output("N/A\n"), None);
        assert_eq!(parse_duration_output("0.000000"), None);
        assert_eq!(parse_duration_output("-3"), None);
        assert_eq!(parse_duration_output("inf"), None);
        assert_eq!(parse_duration_output("NaN"), None);
    }

    #[test]
    fn command_line_matches_ffprobe_contract() {
        let prober = FfprobeProber::new(ProcessRunner::default());
        let spec = prober.command(Path::new("/media/clip.mp4"));
        assert_eq!(spec.program, "ffprobe");
        let args: Vec<_> = spec.args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "-v",
                "error",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                "-show_entries",
                "format=duration",
                "/media/clip.mp4"
            ]
        );
    }

    #[tokio::test]
    async fn missing_tool_yields_none() {
        let prober = FfprobeProber::new(ProcessRunner::default())
            .with_program("ffprobe-not-installed-for-tests");
        assert_eq!(prober.probe(Path::new("clip.mp4")).await, None);
    }

    #[tokio::test]
    async fn no_probe_always_none() {
        assert_eq!(NoProbe.probe(Path::new("clip.mp4")).await, None);
    }
}
