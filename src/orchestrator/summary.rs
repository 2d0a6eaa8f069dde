//! Run results.

use crate::poller::{Identifier, ObservedIdentifier};
use crate::supervisor::ProvisionOutcome;
use crate::tool::AccountInfo;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use uuid::Uuid;

/// Identifiers discovered in a run, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentResult {
    pub mapping: Vec<ObservedIdentifier>,
    pub unresolved: BTreeSet<String>,
}

impl DeploymentResult {
    pub fn record(&mut self, outcome: &ProvisionOutcome) {
        match outcome.observed() {
            Some(observed) => self.mapping.push(observed),
            None => {
                self.unresolved.insert(outcome.resource.clone());
            }
        }
    }

    pub fn identifier_of(&self, resource: &str) -> Option<&Identifier> {
        self.mapping
            .iter()
            .find(|observed| observed.resource == resource)
            .map(|observed| &observed.id)
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// What happened to the config artifact at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfigUpdate {
    /// No artifact configured
    Disabled,
    /// Artifact left untouched
    Skipped { reason: String },
    /// Artifact already held every identifier
    Unchanged {
        path: PathBuf,
        applied: Vec<String>,
        missing: Vec<String>,
    },
    Patched {
        path: PathBuf,
        applied: Vec<String>,
        missing: Vec<String>,
    },
    Failed { path: PathBuf, error: String },
}

impl ConfigUpdate {
    /// Whether every confirmed identifier made it into the artifact.
    pub fn is_complete(&self) -> bool {
        match self {
            ConfigUpdate::Disabled | ConfigUpdate::Skipped { .. } => true,
            ConfigUpdate::Unchanged { missing, .. } | ConfigUpdate::Patched { missing, .. } => {
                missing.is_empty()
            }
            ConfigUpdate::Failed { .. } => false,
        }
    }
}

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every resource confirmed and the artifact is up to date
    Complete,
    /// Some resources unresolved, or the artifact could not be fully updated
    Partial,
    NoResourcesConfirmed,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Complete => 0,
            RunStatus::Partial => 2,
            RunStatus::NoResourcesConfirmed => 1,
        }
    }
}

/// Full record of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub account: AccountInfo,
    pub result: DeploymentResult,
    pub outcomes: Vec<ProvisionOutcome>,
    pub config: ConfigUpdate,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn status(&self) -> RunStatus {
        if self.result.is_empty() {
            RunStatus::NoResourcesConfirmed
        } else if !self.result.unresolved.is_empty() || !self.config.is_complete() {
            RunStatus::Partial
        } else {
            RunStatus::Complete
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status().exit_code()
    }
}
