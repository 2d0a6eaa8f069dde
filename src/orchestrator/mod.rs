//! Reconciliation orchestrator module.
//!
//! Runs every declared resource through the provisioning supervisor, one at a
//! time and in declaration order, collects the confirmed identifiers and
//! hands them to the config patcher. Per-resource failures never abort a run:
//! they end up in [`DeploymentResult::unresolved`]. Only an invalid resource
//! list or an unrenderable command template fails the run up front.

mod error;
mod resource;
mod summary;


pub use error::ReconcileError;
pub use resource::ResourceSpec;
pub use summary::{ConfigUpdate, DeploymentResult, RunStatus, RunSummary};

use crate::patcher::ConfigPatcher;
use crate::poller::Sleeper;
use crate::runner::CommandRunner;
use crate::supervisor::{
    ProvisionError, ProvisionOutcome, ProvisioningSupervisor, ResourceCommands, SupervisorSettings,
};
use crate::tool::ProvisioningTool;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Config artifact rewritten at the end of a run.
#[derive(Debug, Clone)]
struct ArtifactTarget {
    path: PathBuf,
    patcher: ConfigPatcher,
}

/// Drives a declared resource list to "provisioned, identifier known, config
/// updated".
pub struct Reconciler {
    runner: Arc<dyn CommandRunner>,
    sleeper: Arc<dyn Sleeper>,
    tool: ProvisioningTool,
    settings: SupervisorSettings,
    settle_delay: Duration,
    artifact: Option<ArtifactTarget>,
}

impl Reconciler {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        sleeper: Arc<dyn Sleeper>,
        tool: ProvisioningTool,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            runner,
            sleeper,
            tool,
            settings,
            settle_delay: Duration::ZERO,
            artifact: None,
        }
    }

    /// Pause between consecutive resources.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Patch `path` with the discovered identifiers after the run.
    pub fn with_artifact(mut self, path: impl Into<PathBuf>, patcher: ConfigPatcher) -> Self {
        self.artifact = Some(ArtifactTarget {
            path: path.into(),
            patcher,
        });
        self
    }

    /// Reconcile `resources` in order.
    ///
    /// Cancelling `cancel` stops the run once the in-flight resource has been
    /// cleaned up; resources not yet started are reported unresolved.
    pub async fn reconcile(
        &self,
        resources: &[ResourceSpec],
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ReconcileError> {
        resource::validate_list(resources)?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("reconcile", %run_id);
        self.run(run_id, resources, cancel).instrument(span).await
    }

    async fn run(
        &self,
        run_id: Uuid,
        resources: &[ResourceSpec],
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ReconcileError> {
        let started_at = Utc::now();
        tracing::info!(
            resources = resources.len(),
            program = self.tool.program(),
            "Starting reconciliation"
        );

        let account = self.tool.query_account(self.runner.as_ref()).await;
        match (&account.identifier, &account.balance) {
            (Some(identifier), balance) => {
                tracing::info!(account = %identifier, balance = ?balance, "Using account")
            }
            (None, _) => tracing::warn!("Account identifier unavailable"),
        }

        let commands = resources
            .iter()
            .map(|r| {
                self.tool
                    .resource_commands(r.name(), account.identifier.as_deref())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut result = DeploymentResult::default();
        let mut outcomes = Vec::with_capacity(resources.len());

        for (index, (resource, commands)) in resources.iter().zip(&commands).enumerate() {
            let outcome = self.step(index, resource, commands, cancel).await;
            result.record(&outcome);
            outcomes.push(outcome);
        }

        let config = self.update_config(&result);
        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            account,
            result,
            outcomes,
            config,
            cancelled: cancel.is_cancelled(),
        };

        tracing::info!(
            confirmed = summary.result.mapping.len(),
            unresolved = summary.result.unresolved.len(),
            status = ?summary.status(),
            "Reconciliation finished"
        );
        Ok(summary)
    }

    async fn step(
        &self,
        index: usize,
        resource: &ResourceSpec,
        commands: &ResourceCommands,
        cancel: &CancellationToken,
    ) -> ProvisionOutcome {
        if index > 0 && !self.settle_delay.is_zero() && !cancel.is_cancelled() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = self.sleeper.sleep(self.settle_delay) => {}
            }
        }
        if cancel.is_cancelled() {
            tracing::info!(resource = %resource, "Run cancelled, skipping resource");
            return ProvisionOutcome::not_attempted(resource.name(), ProvisionError::Cancelled);
        }

        let supervisor = ProvisioningSupervisor::new(
            Arc::clone(&self.runner),
            Arc::clone(&self.sleeper),
            self.settings,
        );
        let span = tracing::info_span!("resource", resource = %resource);
        supervisor
            .supervise(resource.name(), commands, cancel)
            .instrument(span)
            .await
    }

    fn update_config(&self, result: &DeploymentResult) -> ConfigUpdate {
        let Some(target) = &self.artifact else {
            return ConfigUpdate::Disabled;
        };
        if result.is_empty() {
            tracing::warn!(
                path = %target.path.display(),
                "No resources confirmed, leaving config artifact untouched"
            );
            return ConfigUpdate::Skipped {
                reason: "no resources confirmed".to_string(),
            };
        }

        match target.patcher.patch_file(&target.path, &result.mapping) {
            Ok(outcome) if outcome.changed => ConfigUpdate::Patched {
                path: target.path.clone(),
                applied: outcome.applied,
                missing: outcome.missing,
            },
            Ok(outcome) => ConfigUpdate::Unchanged {
                path: target.path.clone(),
                applied: outcome.applied,
                missing: outcome.missing,
            },
            Err(e) => {
                tracing::error!(path = %target.path.display(), error = %e, "Config update failed");
                ConfigUpdate::Failed {
                    path: target.path.clone(),
                    error: e.to_string(),
                }
            }
        }
    }
}
