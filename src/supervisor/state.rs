//! Per-resource attempt state.

use super::error::ProvisionError;
use crate::poller::{Identifier, ObservedIdentifier};
use crate::runner::{ExitInfo, ProcessHandle};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

/// Lifecycle of one resource within a run.
///
/// `NotStarted -> Launched -> {Confirmed, Abandoned}`; adoption of an already
/// provisioned resource goes straight from `NotStarted` to `Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    NotStarted,
    Launched,
    Confirmed,
    Abandoned,
}

/// A provisioning attempt in flight, owned by the supervisor.
pub(crate) struct ProvisionAttempt {
    pub resource: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub process: Option<Box<dyn ProcessHandle>>,
    state: AttemptState,
}

impl ProvisionAttempt {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            process: None,
            state: AttemptState::NotStarted,
        }
    }

    pub fn launched(&mut self, process: Box<dyn ProcessHandle>) {
        self.process = Some(process);
        self.state = AttemptState::Launched;
    }

    /// Close the attempt. The process must already have been settled.
    pub fn finish(self, result: AttemptResult) -> ProvisionOutcome {
        let launched = self.state == AttemptState::Launched;
        let (state, identifier, error) = match result.resolution {
            Ok(identifier) => (AttemptState::Confirmed, Some(identifier), None),
            Err(error) => (AttemptState::Abandoned, None, Some(error)),
        };
        ProvisionOutcome {
            resource: self.resource,
            state,
            identifier,
            error,
            attempts: result.attempts,
            launched,
            adopted: result.adopted,
            launcher_exit: result.launcher_exit,
            started_at: self.started_at,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

pub(crate) struct AttemptResult {
    pub resolution: Result<Identifier, ProvisionError>,
    pub attempts: u32,
    pub adopted: bool,
    pub launcher_exit: Option<ExitInfo>,
}

/// Terminal record of one resource's provisioning attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    pub resource: String,
    pub state: AttemptState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProvisionError>,
    /// Status attempts made
    pub attempts: u32,
    /// Whether the provisioning command was launched
    pub launched: bool,
    /// Confirmed from an existing identifier without launching
    pub adopted: bool,
    /// How the provisioning process ended; informational only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launcher_exit: Option<ExitInfo>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl ProvisionOutcome {
    /// Record for a resource that was never attempted.
    pub fn not_attempted(resource: &str, error: ProvisionError) -> Self {
        ProvisionAttempt::new(resource).finish(AttemptResult {
            resolution: Err(error),
            attempts: 0,
            adopted: false,
            launcher_exit: None,
        })
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == AttemptState::Confirmed
    }

    pub fn observed(&self) -> Option<ObservedIdentifier> {
        self.identifier
            .as_ref()
            .map(|id| ObservedIdentifier::new(self.resource.clone(), id.clone()))
    }
}
