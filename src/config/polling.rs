//! Polling and timing configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and budgets for supervising one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Wait after launching before the first status query
    pub launch_grace_secs: u64,
    /// Fixed wait between status queries
    pub interval_secs: u64,
    /// Status queries per resource
    pub max_attempts: u32,
    /// Bound on a single status query; must be shorter than the interval
    pub status_timeout_secs: u64,
    /// How long a confirmed launcher may keep running before it is terminated
    pub exit_grace_secs: u64,
    /// Pause between resources
    pub settle_delay_ms: u64,
    /// Look for an existing identifier before launching
    pub adopt_existing: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            launch_grace_secs: 10,
            interval_secs: 10,
            max_attempts: 6,
            status_timeout_secs: 5,
            exit_grace_secs: 30,
            settle_delay_ms: 3000,
            adopt_existing: false,
        }
    }
}

impl PollingConfig {
    pub fn launch_grace(&self) -> Duration {
        Duration::from_secs(self.launch_grace_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_secs(self.exit_grace_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
