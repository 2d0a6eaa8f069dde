//! Provisioning supervisor module.
//!
//! Drives one resource through `NotStarted -> Launched -> {Confirmed,
//! Abandoned}`: the provisioning command runs in the background while the
//! status poller looks for the resource's identifier. The provisioning
//! process is untrusted. Its exit status is recorded but never decides the
//! outcome; only an identifier observed through the status command does.

mod error;
mod state;


pub use error::ProvisionError;
pub use state::{AttemptState, ProvisionOutcome};

use crate::config::PollingConfig;
use crate::poller::{AttemptOutcome, PollPolicy, PollResult, Sleeper, StatusPoller};
use crate::runner::{CommandRunner, CommandSpec, ExitInfo, ProcessHandle};
use state::{AttemptResult, ProvisionAttempt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timing and budget for one supervised attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Wait after launch before the first status query
    pub launch_grace: Duration,
    /// How long a still-running launcher may take to exit after confirmation
    pub exit_grace: Duration,
    pub poll: PollPolicy,
    /// Query status once before launching and adopt an existing identifier
    pub adopt_existing: bool,
}

impl From<&PollingConfig> for SupervisorSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            launch_grace: config.launch_grace(),
            exit_grace: config.exit_grace(),
            poll: PollPolicy {
                interval: config.interval(),
                max_attempts: config.max_attempts,
            },
            adopt_existing: config.adopt_existing,
        }
    }
}

/// Rendered boundary commands for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCommands {
    pub provision: CommandSpec,
    pub status: CommandSpec,
}

/// Supervises provisioning attempts, one resource at a time.
pub struct ProvisioningSupervisor {
    runner: Arc<dyn CommandRunner>,
    sleeper: Arc<dyn Sleeper>,
    poller: StatusPoller,
    settings: SupervisorSettings,
}

impl ProvisioningSupervisor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        sleeper: Arc<dyn Sleeper>,
        settings: SupervisorSettings,
    ) -> Self {
        let poller = StatusPoller::new(Arc::clone(&runner), Arc::clone(&sleeper));
        Self {
            runner,
            sleeper,
            poller,
            settings,
        }
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Drive `resource` to a terminal state.
    ///
    /// Never fails: every error is folded into an `Abandoned` outcome. The
    /// provisioning process is gone (exited or terminated) when this returns,
    /// including on cancellation.
    pub async fn supervise(
        &self,
        resource: &str,
        commands: &ResourceCommands,
        cancel: &CancellationToken,
    ) -> ProvisionOutcome {
        let mut attempt = ProvisionAttempt::new(resource);

        if cancel.is_cancelled() {
            return self.abandon(attempt, ProvisionError::Cancelled, 0).await;
        }

        if self.settings.adopt_existing {
            if let AttemptOutcome::Confirmed(identifier) =
                self.poller.attempt(&commands.status).await
            {
                tracing::info!(
                    resource,
                    identifier = %identifier,
                    "Resource already provisioned, adopting existing identifier"
                );
                return attempt.finish(AttemptResult {
                    resolution: Ok(identifier),
                    attempts: 1,
                    adopted: true,
                    launcher_exit: None,
                });
            }
        }

        match self.runner.spawn(&commands.provision).await {
            Ok(process) => {
                tracing::info!(
                    resource,
                    pid = process.pid(),
                    command = %commands.provision.command_line(),
                    "Launched provisioning command"
                );
                attempt.launched(process);
            }
            Err(e) => {
                tracing::warn!(resource, error = %e, "Provisioning command failed to start");
                let error = ProvisionError::ProcessSpawn {
                    message: e.to_string(),
                };
                return self.abandon(attempt, error, 0).await;
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return self.abandon(attempt, ProvisionError::Cancelled, 0).await;
            }
            _ = self.sleeper.sleep(self.settings.launch_grace) => {}
        }

        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.poller.poll(&commands.status, &self.settings.poll) => Some(result),
        };

        match polled {
            Some(PollResult::Found {
                identifier,
                attempts,
            }) => {
                tracing::info!(
                    resource,
                    identifier = %identifier,
                    attempts,
                    "Resource confirmed"
                );
                let launcher_exit = match attempt.process.take() {
                    Some(mut process) => {
                        settle(resource, process.as_mut(), self.settings.exit_grace, cancel)
                            .await
                    }
                    None => None,
                };
                attempt.finish(AttemptResult {
                    resolution: Ok(identifier),
                    attempts,
                    adopted: false,
                    launcher_exit,
                })
            }
            Some(PollResult::NotFound { attempts, last }) => {
                let error = ProvisionError::BudgetExhausted { attempts, last };
                self.abandon(attempt, error, attempts).await
            }
            None => self.abandon(attempt, ProvisionError::Cancelled, 0).await,
        }
    }

    async fn abandon(
        &self,
        mut attempt: ProvisionAttempt,
        error: ProvisionError,
        attempts: u32,
    ) -> ProvisionOutcome {
        tracing::warn!(resource = %attempt.resource, error = %error, "Abandoning resource");
        let launcher_exit = match attempt.process.take() {
            Some(mut process) => terminate(&attempt.resource, process.as_mut()).await,
            None => None,
        };
        attempt.finish(AttemptResult {
            resolution: Err(error),
            attempts,
            adopted: false,
            launcher_exit,
        })
    }
}

/// Let a confirmed launcher finish on its own within `grace`, else kill it.
/// Cancellation cuts the grace period short.
async fn settle(
    resource: &str,
    process: &mut dyn ProcessHandle,
    grace: Duration,
    cancel: &CancellationToken,
) -> Option<ExitInfo> {
    match process.try_wait() {
        Ok(Some(exit)) => {
            tracing::debug!(resource, exit = %exit, "Provisioning process already exited");
            return Some(exit);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(resource, error = %e, "Failed to check provisioning process");
            return terminate(resource, process).await;
        }
    }

    let waited = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = process.wait_for(grace) => Some(result),
    };

    match waited {
        None => {
            tracing::info!(resource, "Run cancelled, terminating provisioning process");
            terminate(resource, process).await
        }
        Some(Ok(Some(exit))) => Some(exit),
        Some(Ok(None)) => {
            tracing::info!(
                resource,
                grace_secs = grace.as_secs(),
                "Provisioning process still running after grace period, terminating"
            );
            terminate(resource, process).await
        }
        Some(Err(e)) => {
            tracing::warn!(resource, error = %e, "Failed waiting for provisioning process");
            terminate(resource, process).await
        }
    }
}

async fn terminate(resource: &str, process: &mut dyn ProcessHandle) -> Option<ExitInfo> {
    let pid = process.pid();
    match process.terminate().await {
        Ok(exit) => {
            tracing::debug!(resource, pid, exit = %exit, "Provisioning process terminated");
            Some(exit)
        }
        Err(e) => {
            tracing::error!(resource, pid, error = %e, "Failed to terminate provisioning process");
            None
        }
    }
}
