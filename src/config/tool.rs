//! Provisioning tool and command template configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The external provisioning tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Executable invoked for every boundary command
    pub program: String,
    /// Directory receiving one log file per launched provisioning command.
    /// When unset, background output is discarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "dfx".to_string(),
            log_dir: None,
        }
    }
}

/// Argument templates for the boundary commands.
///
/// `{resource}` expands to the resource name and `{account}` to the account
/// identifier. An empty account template disables that query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub provision: Vec<String>,
    pub status: Vec<String>,
    pub account_id: Vec<String>,
    pub account_balance: Vec<String>,
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            provision: args(&[
                "deploy",
                "{resource}",
                "--network",
                "ic",
                "--wallet",
                "{account}",
                "--yes",
            ]),
            status: args(&["canister", "id", "{resource}", "--network", "ic"]),
            account_id: args(&["identity", "get-wallet", "--network", "ic"]),
            account_balance: args(&["wallet", "--network", "ic", "balance"]),
        }
    }
}

/// Account used by provisioning commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Identifier substituted for `{account}` when the account query fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}
