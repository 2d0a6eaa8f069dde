//! Configuration module for the provisioner
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`PROVISIONER_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use provisioner::config::ProvisionerConfig;
//!
//! let toml = r#"
//! resources = ["backend", "frontend"]
//!
//! [polling]
//! max_attempts = 20
//! "#;
//! let config: ProvisionerConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.resources.len(), 2);
//! assert_eq!(config.polling.max_attempts, 20);
//! assert_eq!(config.tool.program, "dfx");
//! ```

pub mod error;
pub mod logging;
pub mod patch;
pub mod polling;
pub mod tool;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use patch::PatchConfig;
pub use polling::PollingConfig;
pub use tool::{AccountConfig, CommandsConfig, ToolConfig};

use crate::patcher::ConfigPatcher;
use crate::runner::EnvOverrides;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Unified provisioner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Resources to reconcile, in order
    pub resources: Vec<String>,
    pub tool: ToolConfig,
    pub commands: CommandsConfig,
    /// Environment changes passed to every tool invocation
    pub environment: EnvOverrides,
    pub account: AccountConfig,
    pub polling: PollingConfig,
    pub patch: PatchConfig,
    pub logging: LoggingConfig,
}

/// Environment the deployment tool is run with unless configured otherwise:
/// plain, uncolored output and no interactive warnings.
pub fn default_environment() -> EnvOverrides {
    EnvOverrides::new()
        .with_var("NO_COLOR", "1")
        .with_var("TERM", "dumb")
        .with_var("RUST_BACKTRACE", "0")
        .with_var("DFX_WARNING", "-mainnet_plaintext_identity")
        .without_vars_containing("COLOR")
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            resources: Vec::new(),
            tool: ToolConfig::default(),
            commands: CommandsConfig::default(),
            environment: default_environment(),
            account: AccountConfig::default(),
            polling: PollingConfig::default(),
            patch: PatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ProvisionerConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (the current value is kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("PROVISIONER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("PROVISIONER_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        if let Ok(program) = std::env::var("PROVISIONER_TOOL") {
            if !program.trim().is_empty() {
                self.tool.program = program;
            }
        }
        if let Ok(artifact) = std::env::var("PROVISIONER_CONFIG_ARTIFACT") {
            if !artifact.trim().is_empty() {
                self.patch.artifact = PathBuf::from(artifact);
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tool.program.trim().is_empty() {
            return Err(ConfigError::invalid(
                "tool.program",
                "program cannot be empty",
            ));
        }
        if self.commands.provision.is_empty() {
            return Err(ConfigError::invalid(
                "commands.provision",
                "provision template cannot be empty",
            ));
        }
        if self.commands.status.is_empty() {
            return Err(ConfigError::invalid(
                "commands.status",
                "status template cannot be empty",
            ));
        }

        let polling = &self.polling;
        if polling.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "polling.max_attempts",
                "at least one status attempt is required",
            ));
        }
        if polling.status_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "polling.status_timeout_secs",
                "status timeout must be non-zero",
            ));
        }
        if polling.status_timeout_secs >= polling.interval_secs {
            return Err(ConfigError::invalid(
                "polling.status_timeout_secs",
                format!(
                    "status timeout ({}s) must be shorter than the poll interval ({}s)",
                    polling.status_timeout_secs, polling.interval_secs
                ),
            ));
        }

        if let Some(pattern) = &self.patch.expression_pattern {
            ConfigPatcher::with_expression(pattern).map_err(|e| {
                ConfigError::invalid("patch.expression_pattern", e.to_string())
            })?;
        }

        Ok(())
    }
}
