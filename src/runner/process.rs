//! Operating-system implementation of [`CommandRunner`].

use super::{CommandOutput, CommandRunner, CommandSpec, ExitInfo, ProcessHandle, RunnerError};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// How long to keep draining pipes after the process is gone.
///
/// Grandchildren can inherit the pipes and keep them open; output read up to
/// this point is still returned.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Runs commands as real child processes via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Each command leads its own process group so that whatever it forks
    /// can be killed along with it.
    fn build_command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        spec.env.apply(&mut cmd);
        cmd
    }
}

/// SIGKILL every process in the group led by `pgid`.
///
/// The group outlives its leader while any descendant is still in it, so this
/// is also called after the leader has exited.
#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid, error = %e, "Failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

fn spawn_reader<R>(mut reader: R) -> (SharedBuffer, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer: SharedBuffer = Arc::default();
    let sink = Arc::clone(&buffer);
    let handle = tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    sink.lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .extend_from_slice(&chunk[..n]);
                }
            }
        }
    });
    (buffer, handle)
}

async fn drain(reader: Option<(SharedBuffer, JoinHandle<()>)>) -> String {
    let Some((buffer, mut handle)) = reader else {
        return String::new();
    };
    if tokio::time::timeout(PIPE_DRAIN_TIMEOUT, &mut handle)
        .await
        .is_err()
    {
        handle.abort();
    }
    let bytes = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let text = String::from_utf8_lossy(&bytes).into_owned();
    text
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        let mut cmd = Self::build_command(spec);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        let pgid = child.id();

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let (exit_code, timed_out) = match tokio::time::timeout(spec.timeout, child.wait()).await
        {
            Ok(status) => (status?.code(), false),
            Err(_) => {
                tracing::debug!(
                    command = %spec.command_line(),
                    timeout_ms = spec.timeout.as_millis() as u64,
                    "Command timed out, killing"
                );
                if let Some(pgid) = pgid {
                    kill_process_group(pgid);
                }
                if let Err(e) = child.kill().await {
                    tracing::warn!(command = %spec.command_line(), error = %e, "Failed to kill timed out command");
                }
                (None, true)
            }
        };

        Ok(CommandOutput {
            exit_code,
            stdout: drain(stdout).await,
            stderr: drain(stderr).await,
            timed_out,
        })
    }

    async fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ProcessHandle>, RunnerError> {
        let mut cmd = Self::build_command(spec);

        match &spec.log_file {
            Some(path) => {
                let open_error = |source| RunnerError::LogFile {
                    path: path.clone(),
                    source,
                };
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(open_error)?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(open_error)?;
                let err_file = file.try_clone().map_err(open_error)?;
                cmd.stdout(Stdio::from(file)).stderr(Stdio::from(err_file));
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        tracing::debug!(
            command = %spec.command_line(),
            pid = child.id(),
            "Spawned background process"
        );

        Ok(Box::new(SpawnedProcess {
            pgid: child.id(),
            child,
            exit: None,
        }))
    }
}

/// A background child process owned by the caller.
///
/// Terminating or dropping this handle kills the child's whole process
/// group, including descendants that outlived the child itself.
#[derive(Debug)]
pub struct SpawnedProcess {
    child: Child,
    pgid: Option<u32>,
    exit: Option<ExitInfo>,
}

impl SpawnedProcess {
    fn kill_group(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_process_group(pgid);
        }
    }

    fn record(&mut self, status: std::process::ExitStatus) -> ExitInfo {
        let exit = ExitInfo::from(status);
        self.exit = Some(exit);
        exit
    }
}

#[async_trait]
impl ProcessHandle for SpawnedProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_wait(&mut self) -> Result<Option<ExitInfo>, RunnerError> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }
        Ok(self.child.try_wait()?.map(|status| self.record(status)))
    }

    async fn wait_for(&mut self, limit: Duration) -> Result<Option<ExitInfo>, RunnerError> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }
        match tokio::time::timeout(limit, self.child.wait()).await {
            Ok(status) => Ok(Some(self.record(status?))),
            Err(_) => Ok(None),
        }
    }

    async fn terminate(&mut self) -> Result<ExitInfo, RunnerError> {
        self.kill_group();
        if let Some(exit) = self.try_wait()? {
            return Ok(exit);
        }
        self.child.kill().await?;
        let status = self.child.wait().await?;
        Ok(self.record(status))
    }
}

impl Drop for SpawnedProcess {
    fn drop(&mut self) {
        self.kill_group();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::runner::EnvOverrides;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", ["-c", script]).with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_run_captures_stdout_and_stderr() {
        let output = ProcessRunner::new()
            .run(&sh("echo out; echo err >&2"))
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.timed_out);
    }

    #[tokio::test]
    async fn test_run_non_zero_exit_is_not_an_error() {
        let output = ProcessRunner::new()
            .run(&sh("echo partial; exit 134"))
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(134));
        assert_eq!(output.stdout.trim(), "partial");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_run_timeout_returns_partial_output() {
        let spec = sh("echo before; sleep 10; echo after").with_timeout(Duration::from_millis(300));
        let output = ProcessRunner::new().run(&spec).await.unwrap();

        assert!(output.timed_out);
        assert_eq!(output.exit_code, None);
        assert!(output.stdout.contains("before"));
        assert!(!output.stdout.contains("after"));
    }

    #[tokio::test]
    async fn test_run_missing_program_is_spawn_error() {
        let spec = CommandSpec::new("definitely-not-a-real-program-4821", ["x"]);
        let result = ProcessRunner::new().run(&spec).await;
        assert!(matches!(result, Err(RunnerError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_run_applies_env_overrides() {
        let spec = sh("echo \"$PROVISIONER_TEST_VALUE\"")
            .with_env(EnvOverrides::new().with_var("PROVISIONER_TEST_VALUE", "pinned"));
        let output = ProcessRunner::new().run(&spec).await.unwrap();
        assert_eq!(output.stdout.trim(), "pinned");
    }

    #[tokio::test]
    async fn test_spawned_process_terminate_reaps_child() {
        let mut handle = ProcessRunner::new().spawn(&sh("sleep 30")).await.unwrap();
        assert!(handle.pid().is_some());
        assert!(handle.try_wait().unwrap().is_none());

        let exit = handle.terminate().await.unwrap();
        assert!(!exit.success);
        assert_eq!(handle.try_wait().unwrap(), Some(exit));
    }

    #[tokio::test]
    async fn test_spawned_process_wait_for_observes_crash() {
        let mut handle = ProcessRunner::new().spawn(&sh("exit 3")).await.unwrap();
        let exit = handle
            .wait_for(Duration::from_secs(5))
            .await
            .unwrap()
            .expect("process should exit");
        assert_eq!(exit.code, Some(3));

        // Terminating after exit returns the recorded status
        assert_eq!(handle.terminate().await.unwrap(), exit);
    }

    /// Whether `pid` is a live (non-zombie) process.
    #[cfg(target_os = "linux")]
    fn is_alive(pid: &str) -> bool {
        std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .map(|stat| {
                stat.rsplit_once(')')
                    .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    #[cfg(target_os = "linux")]
    async fn read_pid_file(path: &std::path::Path) -> String {
        for _ in 0..100 {
            if let Ok(pid) = std::fs::read_to_string(path) {
                if !pid.trim().is_empty() {
                    return pid.trim().to_string();
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("pid file {} never written", path.display());
    }

    #[cfg(target_os = "linux")]
    async fn wait_until_gone(pid: &str) -> bool {
        for _ in 0..100 {
            if !is_alive(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_terminate_kills_forked_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("worker.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

        let mut handle = ProcessRunner::new().spawn(&sh(&script)).await.unwrap();
        let worker = read_pid_file(&pid_file).await;
        assert!(is_alive(&worker));

        handle.terminate().await.unwrap();
        assert!(wait_until_gone(&worker).await, "worker {worker} survived terminate");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_terminate_after_exit_kills_leftover_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("worker.pid");
        let script = format!(
            "sleep 30 >/dev/null 2>&1 & echo $! > '{}'",
            pid_file.display()
        );

        let mut handle = ProcessRunner::new().spawn(&sh(&script)).await.unwrap();
        let worker = read_pid_file(&pid_file).await;
        let exit = handle.wait_for(Duration::from_secs(5)).await.unwrap();
        assert_eq!(exit.map(|e| e.code), Some(Some(0)));
        assert!(is_alive(&worker));

        handle.terminate().await.unwrap();
        assert!(wait_until_gone(&worker).await, "worker {worker} survived terminate");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropping_handle_kills_forked_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("worker.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

        let handle = ProcessRunner::new().spawn(&sh(&script)).await.unwrap();
        let worker = read_pid_file(&pid_file).await;
        drop(handle);
        assert!(wait_until_gone(&worker).await, "worker {worker} survived drop");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_run_timeout_kills_forked_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("worker.pid");
        let script = format!(
            "sleep 30 >/dev/null 2>&1 & echo $! > '{}'; wait",
            pid_file.display()
        );
        let spec = sh(&script).with_timeout(Duration::from_millis(300));

        let output = ProcessRunner::new().run(&spec).await.unwrap();
        assert!(output.timed_out);
        let worker = read_pid_file(&pid_file).await;
        assert!(wait_until_gone(&worker).await, "worker {worker} survived timeout");
    }

    #[tokio::test]
    async fn test_spawn_writes_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("provision.log");
        let spec = sh("echo launched; echo oops >&2").with_log_file(&log);

        let mut handle = ProcessRunner::new().spawn(&spec).await.unwrap();
        handle.wait_for(Duration::from_secs(5)).await.unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("launched"));
        assert!(content.contains("oops"));
    }
}
