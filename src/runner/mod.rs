//! Command runner module.
//!
//! Executes external processes with bounded waits and explicit environment
//! overrides. Two shapes are supported:
//!
//! - [`CommandRunner::run`] runs a short-lived command to completion (or until
//!   its timeout elapses) and captures its output.
//! - [`CommandRunner::spawn`] launches a long-running background process and
//!   returns a [`ProcessHandle`] that can be polled, awaited or terminated.
//!
//! A process's exit code is informational only. Callers that need to know
//! whether a side effect happened must observe it independently.

mod env;
mod error;
mod process;

pub use env::EnvOverrides;
pub use error::RunnerError;
pub use process::{ProcessRunner, SpawnedProcess};

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default bound for [`CommandRunner::run`].
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully rendered command ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: EnvOverrides,
    /// Upper bound on a foreground run; ignored by `spawn`
    pub timeout: Duration,
    /// Background output destination; `None` discards it
    pub log_file: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: EnvOverrides::default(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            log_file: None,
        }
    }

    pub fn with_env(mut self, env: EnvOverrides) -> Self {
        self.env = env;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Human-readable command line (program followed by arguments).
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a foreground run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal or timed out
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The timeout elapsed and the process was killed; output is partial
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// How a background process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitInfo {
    /// `None` when terminated by a signal
    pub code: Option<i32>,
    pub success: bool,
}

impl ExitInfo {
    pub fn killed() -> Self {
        Self {
            code: None,
            success: false,
        }
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            success: status.success(),
        }
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit {}", code),
            None => write!(f, "killed"),
        }
    }
}

/// Handle to a running background process.
///
/// Dropping a handle must not leave the process running.
#[async_trait]
pub trait ProcessHandle: Send {
    /// OS process id, if still known.
    fn pid(&self) -> Option<u32>;

    /// Non-blocking check whether the process has exited.
    fn try_wait(&mut self) -> Result<Option<ExitInfo>, RunnerError>;

    /// Wait up to `limit` for the process to exit on its own.
    ///
    /// Returns `Ok(None)` if it is still running when the limit elapses.
    async fn wait_for(&mut self, limit: Duration) -> Result<Option<ExitInfo>, RunnerError>;

    /// Force-terminate the process and reap it.
    ///
    /// Terminating an already exited process returns its recorded exit.
    async fn terminate(&mut self) -> Result<ExitInfo, RunnerError>;
}

/// Executes external commands.
///
/// This is the seam between the reconciliation logic and the operating
/// system; tests substitute a scripted implementation.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion within `spec.timeout`.
    ///
    /// Never fails on a non-zero exit code. If the timeout elapses the process
    /// is killed and the partial output is returned with `timed_out` set.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError>;

    /// Launch a background process without waiting for it.
    async fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ProcessHandle>, RunnerError>;
}
