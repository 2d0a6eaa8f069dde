//! Error types for a single provisioning attempt.

use crate::poller::Inconclusive;
use serde::Serialize;
use thiserror::Error;

fn describe_last(last: &Option<Inconclusive>) -> String {
    match last {
        Some(reason) => format!(" (last: {})", reason),
        None => String::new(),
    }
}

/// Why a resource ended up unresolved.
///
/// These never abort a run; the orchestrator records them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProvisionError {
    /// The provisioning command could not be started
    #[error("provisioning command failed to start: {message}")]
    ProcessSpawn { message: String },

    /// The attempt budget ran out without a confirmed identifier
    #[error("no identifier observed after {attempts} status attempts{}", describe_last(.last))]
    BudgetExhausted {
        attempts: u32,
        last: Option<Inconclusive>,
    },

    /// The run was cancelled before the resource was confirmed
    #[error("cancelled before an identifier was observed")]
    Cancelled,
}
