//! Scripted test doubles shared by unit tests.

use crate::poller::Sleeper;
use crate::runner::{
    CommandOutput, CommandRunner, CommandSpec, ExitInfo, ProcessHandle, RunnerError,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const ID_A: &str = "aaaaa-aaaaa-aaaaa-aaaaa-cai";
pub(crate) const ID_B: &str = "bbbbb-bbbbb-bbbbb-bbbbb-cai";
pub(crate) const ID_C: &str = "ccccc-ccccc-ccccc-ccccc-cai";

/// Output of a successful command printing `stdout`.
pub(crate) fn stdout(text: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: text.to_string(),
        ..Default::default()
    }
}

/// Output of a failed command printing `stderr`.
pub(crate) fn failure(code: i32, text: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(code),
        stderr: text.to_string(),
        ..Default::default()
    }
}

/// Output of a command killed by its timeout.
pub(crate) fn timed_out(partial: &str) -> CommandOutput {
    CommandOutput {
        exit_code: None,
        stdout: partial.to_string(),
        timed_out: true,
        ..Default::default()
    }
}

#[derive(Clone)]
pub(crate) enum Scripted {
    Output(CommandOutput),
    SpawnError,
}

/// Shared state of one fake background process.
#[derive(Debug, Default)]
pub(crate) struct FakeProcessState {
    pub command: String,
    pub exit: Option<ExitInfo>,
    pub terminated: AtomicBool,
    pub waits: AtomicU32,
    /// `wait_for` blocks until the process is terminated
    pub held: bool,
}

impl FakeProcessState {
    pub fn is_running(&self) -> bool {
        self.exit.is_none() && !self.terminated.load(Ordering::SeqCst)
    }
}

struct FakeProcess(Arc<FakeProcessState>);

#[async_trait]
impl ProcessHandle for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn try_wait(&mut self) -> Result<Option<ExitInfo>, RunnerError> {
        if self.0.terminated.load(Ordering::SeqCst) {
            return Ok(Some(ExitInfo::killed()));
        }
        Ok(self.0.exit)
    }

    async fn wait_for(&mut self, _limit: Duration) -> Result<Option<ExitInfo>, RunnerError> {
        self.0.waits.fetch_add(1, Ordering::SeqCst);
        if self.0.held && self.0.is_running() {
            std::future::pending::<()>().await;
        }
        self.try_wait()
    }

    async fn terminate(&mut self) -> Result<ExitInfo, RunnerError> {
        if let Some(exit) = self.0.exit {
            return Ok(exit);
        }
        self.0.terminated.store(true, Ordering::SeqCst);
        Ok(ExitInfo::killed())
    }
}

/// Command runner answering from a script keyed by command line.
///
/// The last scripted response for a command repeats forever; unscripted
/// commands print nothing and exit 1.
#[derive(Default)]
pub(crate) struct FakeRunner {
    script: Mutex<HashMap<String, VecDeque<Scripted>>>,
    runs: Mutex<Vec<String>>,
    timeouts: Mutex<HashMap<String, Duration>>,
    processes: Mutex<Vec<Arc<FakeProcessState>>>,
    spawn_failures: Mutex<Vec<String>>,
    launcher_exit: Mutex<Option<ExitInfo>>,
    hold_launchers: AtomicBool,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, command_line: &str, output: CommandOutput) {
        self.respond_sequence(command_line, vec![Scripted::Output(output)]);
    }

    pub fn respond_sequence(&self, command_line: &str, responses: Vec<Scripted>) {
        self.script
            .lock()
            .unwrap()
            .insert(command_line.to_string(), responses.into());
    }

    /// Make `spawn` fail for this command line.
    pub fn fail_spawn(&self, command_line: &str) {
        self.spawn_failures
            .lock()
            .unwrap()
            .push(command_line.to_string());
    }

    /// Spawned processes exit immediately with this status.
    pub fn launcher_exits_with(&self, exit: ExitInfo) {
        *self.launcher_exit.lock().unwrap() = Some(exit);
    }

    /// Spawned processes keep running through any grace period.
    pub fn hold_launchers(&self) {
        self.hold_launchers.store(true, Ordering::SeqCst);
    }

    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }

    /// Timeout of the most recent run of `command_line`.
    pub fn timeout_of(&self, command_line: &str) -> Option<Duration> {
        self.timeouts.lock().unwrap().get(command_line).copied()
    }

    pub fn run_count(&self, command_line: &str) -> usize {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == command_line)
            .count()
    }

    pub fn processes(&self) -> Vec<Arc<FakeProcessState>> {
        self.processes.lock().unwrap().clone()
    }

    pub fn spawned(&self) -> Vec<String> {
        self.processes()
            .iter()
            .map(|p| p.command.clone())
            .collect()
    }

    pub fn terminated_count(&self) -> usize {
        self.processes()
            .iter()
            .filter(|p| p.terminated.load(Ordering::SeqCst))
            .count()
    }

    pub fn running_count(&self) -> usize {
        self.processes().iter().filter(|p| p.is_running()).count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        let line = spec.command_line();
        self.runs.lock().unwrap().push(line.clone());
        self.timeouts
            .lock()
            .unwrap()
            .insert(line.clone(), spec.timeout);

        let next = {
            let mut script = self.script.lock().unwrap();
            match script.get_mut(&line) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match next {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::SpawnError) => Err(RunnerError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted"),
            }),
            None => Ok(failure(1, "not found")),
        }
    }

    async fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ProcessHandle>, RunnerError> {
        let line = spec.command_line();
        if self.spawn_failures.lock().unwrap().contains(&line) {
            return Err(RunnerError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted"),
            });
        }

        let state = Arc::new(FakeProcessState {
            command: line,
            exit: *self.launcher_exit.lock().unwrap(),
            held: self.hold_launchers.load(Ordering::SeqCst),
            ..Default::default()
        });
        self.processes.lock().unwrap().push(Arc::clone(&state));
        Ok(Box::new(FakeProcess(state)))
    }
}

/// Sleeper that returns immediately and records requested durations.
#[derive(Default)]
pub(crate) struct InstantSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}
