//! Supervision of external player and probe processes.

use std::ffi::{OsStr, OsString};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ProcessError;

/// Program, arguments and the optional stdin sequence that asks it to quit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
    pub quit_input: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            quit_input: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn quit_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.quit_input = Some(input.into());
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        command
    }
}

/// How a supervised process ended once we asked it to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMethod {
    /// It had already exited when the stop was requested.
    AlreadyExited,
    /// It honoured the quit input or SIGTERM within the grace period.
    Graceful,
    /// It had to be killed.
    Killed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process exited successfully on its own.
    Exited,
    /// The timeout expired and the process was stopped.
    TimedOut { stop: StopMethod },
    /// The cancellation token fired and the process was stopped.
    Cancelled { stop: StopMethod },
}

/// Launch seam used by the playback scheduler.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, ProcessError>;
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    grace_period: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

enum Wait {
    Exited(io::Result<ExitStatus>),
    Expired,
    Cancelled,
}

impl ProcessRunner {
    pub fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Run `spec` until it exits, `timeout` expires or `cancel` fires.
    pub async fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, ProcessError> {
        let mut command = spec.command();
        command.stdin(if spec.quit_input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        let mut child = command
            .spawn()
            .map_err(|err| spawn_error(&spec.program, err))?;
        debug!(program = %spec.program, pid = child.id(), ?timeout, "spawned");

        let deadline = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let wait = tokio::select! {
            status = child.wait() => Wait::Exited(status),
            _ = deadline => Wait::Expired,
            _ = cancel.cancelled() => Wait::Cancelled,
        };

        match wait {
            Wait::Exited(status) => {
                let status = status?;
                if status.success() {
                    Ok(RunOutcome::Exited)
                } else {
                    Err(ProcessError::Failed {
                        program: spec.program.clone(),
                        code: status.code(),
                    })
                }
            }
            Wait::Expired => {
                info!(program = %spec.program, ?timeout, "timeout reached; stopping");
                let stop = self.stop(&mut child, spec).await;
                Ok(RunOutcome::TimedOut { stop })
            }
            Wait::Cancelled => {
                info!(program = %spec.program, "cancel received; stopping");
                let stop = self.stop(&mut child, spec).await;
                Ok(RunOutcome::Cancelled { stop })
            }
        }
    }

    /// Run `spec` to completion and return its standard output.
    pub async fn capture(&self, spec: &CommandSpec, timeout: Duration) -> Result<String, ProcessError> {
        let mut command = spec.command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let child = command
            .spawn()
            .map_err(|err| spawn_error(&spec.program, err))?;

        // Dropping the pending future drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ProcessError::TimedOut {
                program: spec.program.clone(),
                after: timeout,
            })??;

        if !output.status.success() {
            debug!(
                program = %spec.program,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "command failed"
            );
            return Err(ProcessError::Failed {
                program: spec.program.clone(),
                code: output.status.code(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn stop(&self, child: &mut Child, spec: &CommandSpec) -> StopMethod {
        if let Ok(Some(_)) = child.try_wait() {
            return StopMethod::AlreadyExited;
        }

        let mut requested = false;
        if let (Some(input), Some(mut stdin)) = (spec.quit_input.as_deref(), child.stdin.take()) {
            match write_quit_input(&mut stdin, input).await {
                Ok(()) => requested = true,
                Err(err) => debug!(program = %spec.program, error = %err, "quit input not delivered"),
            }
        }
        if !requested {
            requested = terminate(child, &spec.program);
        }

        if requested {
            match tokio::time::timeout(self.grace_period, child.wait()).await {
                Ok(Ok(_)) => {
                    debug!(program = %spec.program, "stopped gracefully");
                    return StopMethod::Graceful;
                }
                Ok(Err(err)) => warn!(program = %spec.program, error = %err, "wait after stop failed"),
                Err(_) => warn!(
                    program = %spec.program,
                    grace = ?self.grace_period,
                    "did not exit within grace period; killing"
                ),
            }
        }

        if let Err(err) = child.kill().await {
            warn!(program = %spec.program, error = %err, "kill failed");
        }
        StopMethod::Killed
    }
}

#[async_trait]
impl Launcher for ProcessRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, ProcessError> {
        ProcessRunner::run(self, spec, timeout, cancel).await
    }
}

async fn write_quit_input(stdin: &mut tokio::process::ChildStdin, input: &[u8]) -> io::Result<()> {
    stdin.write_all(input).await?;
    stdin.flush().await
}

fn terminate(child: &Child, program: &str) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => true,
        Err(err) => {
            debug!(program, pid, error = %err, "SIGTERM failed");
            false
        }
    }
}

fn spawn_error(program: &str, err: io::Error) -> ProcessError {
    if err.kind() == io::ErrorKind::NotFound {
        ProcessError::NotFound {
            program: program.to_string(),
        }
    } else {
        ProcessError::Io(err)
    }
}
