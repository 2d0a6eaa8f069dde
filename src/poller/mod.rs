//! Status polling module.
//!
//! Repeatedly runs a status-query command at a fixed interval until a
//! well-formed resource identifier shows up in its output or the attempt
//! budget runs out. A single failed, timed-out or unparseable attempt is
//! never terminal: the remote state may simply not have converged yet.

mod identifier;
mod sleeper;

pub use identifier::{extract_identifier, Identifier, IdentifierError, ObservedIdentifier};
pub use sleeper::{Sleeper, TokioSleeper};

use crate::runner::{CommandRunner, CommandSpec};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Longest output excerpt kept in an inconclusive attempt.
const EXCERPT_CHARS: usize = 160;

/// Interval and budget for one polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// Why a single status attempt did not confirm an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inconclusive {
    /// The status command could not be started
    #[error("status command failed to start: {message}")]
    SpawnFailed { message: String },

    /// The status command exceeded its bound
    #[error("status command timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    /// The output held no well-formed identifier
    #[error("no identifier in status output (exit {exit_code:?}): {excerpt}")]
    MalformedOutput {
        exit_code: Option<i32>,
        excerpt: String,
    },
}

/// Result of one status attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Confirmed(Identifier),
    Inconclusive(Inconclusive),
}

/// Result of a full polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    Found {
        identifier: Identifier,
        attempts: u32,
    },
    NotFound {
        attempts: u32,
        last: Option<Inconclusive>,
    },
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    let mut out: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    if trimmed.chars().count() > EXCERPT_CHARS {
        out.push('…');
    }
    out
}

/// Polls a status command for a resource identifier.
pub struct StatusPoller {
    runner: Arc<dyn CommandRunner>,
    sleeper: Arc<dyn Sleeper>,
}

impl StatusPoller {
    pub fn new(runner: Arc<dyn CommandRunner>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { runner, sleeper }
    }

    /// Run the status command once and look for an identifier.
    ///
    /// Stdout is searched before stderr. The exit code is ignored: the tool
    /// may print the identifier and then crash.
    pub async fn attempt(&self, status: &CommandSpec) -> AttemptOutcome {
        let output = match self.runner.run(status).await {
            Ok(output) => output,
            Err(e) => {
                return AttemptOutcome::Inconclusive(Inconclusive::SpawnFailed {
                    message: e.to_string(),
                })
            }
        };

        if output.timed_out {
            return AttemptOutcome::Inconclusive(Inconclusive::TimedOut {
                timeout_ms: status.timeout.as_millis() as u64,
            });
        }

        match extract_identifier(&output.stdout).or_else(|| extract_identifier(&output.stderr)) {
            Some(identifier) => AttemptOutcome::Confirmed(identifier),
            None => {
                let text = if output.stdout.trim().is_empty() {
                    &output.stderr
                } else {
                    &output.stdout
                };
                AttemptOutcome::Inconclusive(Inconclusive::MalformedOutput {
                    exit_code: output.exit_code,
                    excerpt: excerpt(text),
                })
            }
        }
    }

    /// Poll until an identifier is observed or `policy.max_attempts` is spent.
    ///
    /// Sleeps `policy.interval` between attempts, never after the last one.
    pub async fn poll(&self, status: &CommandSpec, policy: &PollPolicy) -> PollResult {
        let mut last = None;

        for attempt in 1..=policy.max_attempts {
            match self.attempt(status).await {
                AttemptOutcome::Confirmed(identifier) => {
                    tracing::debug!(
                        attempt,
                        identifier = %identifier,
                        "Status query returned identifier"
                    );
                    return PollResult::Found {
                        identifier,
                        attempts: attempt,
                    };
                }
                AttemptOutcome::Inconclusive(reason) => {
                    tracing::debug!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        reason = %reason,
                        "Status not yet available"
                    );
                    last = Some(reason);
                }
            }

            if attempt < policy.max_attempts {
                self.sleeper.sleep(policy.interval).await;
            }
        }

        PollResult::NotFound {
            attempts: policy.max_attempts,
            last,
        }
    }
}
