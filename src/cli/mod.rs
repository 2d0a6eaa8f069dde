//! CLI module for the provisioner
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `reconcile` - Provision every declared resource and update the config artifact
//! - `status` - Show the identifier currently visible for each resource
//! - `patch` - Write known identifiers into the config artifact
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Reconcile the resources declared in provisioner.toml
//! provisioner reconcile
//!
//! # Only the backend, without touching the frontend config
//! provisioner reconcile -r backend --no-patch
//!
//! # Hand-patch an identifier obtained elsewhere
//! provisioner patch backend=rrkah-fqaaa-aaaaa-aaaaq-cai
//! ```

pub mod completions;
pub mod config;
pub mod output;
pub mod patch;
pub mod reconcile;
pub mod status;

pub use completions::handle_completions;
pub use config::handle_config_init;

use crate::config::ProvisionerConfig;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Reconciling provisioner for remotely deployed resources
#[derive(Parser, Debug)]
#[command(
    name = "provisioner",
    version,
    about = "Provision resources through an unreliable tool and record their identifiers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision declared resources and update the config artifact
    Reconcile(ReconcileArgs),
    /// Show the identifier currently visible for each resource
    Status(StatusArgs),
    /// Write identifiers into the config artifact
    Patch(PatchArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "provisioner.toml")]
    pub config: PathBuf,

    /// Resource to reconcile (repeatable); replaces the configured list
    #[arg(short, long = "resource")]
    pub resources: Vec<String>,

    /// Override the config artifact path
    #[arg(long)]
    pub artifact: Option<PathBuf>,

    /// Do not update the config artifact
    #[arg(long)]
    pub no_patch: bool,

    /// Adopt identifiers of resources that already exist instead of redeploying
    #[arg(long)]
    pub adopt_existing: bool,

    /// Output the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "PROVISIONER_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "provisioner.toml")]
    pub config: PathBuf,

    /// Resource to query (repeatable); replaces the configured list
    #[arg(short, long = "resource")]
    pub resources: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PatchArgs {
    /// Assignments of the form `name=identifier`
    #[arg(required = true, value_name = "NAME=ID")]
    pub assignments: Vec<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "provisioner.toml")]
    pub config: PathBuf,

    /// Override the config artifact path
    #[arg(long)]
    pub artifact: Option<PathBuf>,

    /// Output the patch report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "provisioner.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Load the config file if present, otherwise defaults, then apply
/// `PROVISIONER_*` environment overrides.
pub fn load_config(path: &Path) -> Result<ProvisionerConfig, Box<dyn std::error::Error>> {
    let config = if path.exists() {
        ProvisionerConfig::load(Some(path))?
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        ProvisionerConfig::default()
    };
    Ok(config.with_env_overrides())
}
