//! Reconcile command handler

use crate::cli::output::{format_summary_json, format_summary_table};
use crate::cli::{load_config, ReconcileArgs};
use crate::config::ProvisionerConfig;
use crate::logging::init_tracing;
use crate::orchestrator::{Reconciler, ResourceSpec};
use crate::patcher::ConfigPatcher;
use crate::poller::{Sleeper, TokioSleeper};
use crate::runner::{CommandRunner, ProcessRunner};
use crate::supervisor::SupervisorSettings;
use crate::tool::ProvisioningTool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ReconcileArgs,
) -> Result<ProvisionerConfig, Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)?;

    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if !args.resources.is_empty() {
        config.resources = args.resources.clone();
    }
    if let Some(ref artifact) = args.artifact {
        config.patch.artifact = artifact.clone();
    }
    if args.no_patch {
        config.patch.enabled = false;
    }
    if args.adopt_existing {
        config.polling.adopt_existing = true;
    }

    config.validate()?;
    Ok(config)
}

/// Assemble a reconciler from validated configuration.
pub fn build_reconciler(
    config: &ProvisionerConfig,
    runner: Arc<dyn CommandRunner>,
    sleeper: Arc<dyn Sleeper>,
) -> Result<Reconciler, Box<dyn std::error::Error>> {
    let tool = ProvisioningTool::from_config(config);
    let mut reconciler = Reconciler::new(
        runner,
        sleeper,
        tool,
        SupervisorSettings::from(&config.polling),
    )
    .with_settle_delay(config.polling.settle_delay());

    if config.patch.enabled {
        let patcher = match &config.patch.expression_pattern {
            Some(pattern) => ConfigPatcher::with_expression(pattern)?,
            None => ConfigPatcher::default(),
        };
        reconciler = reconciler.with_artifact(config.patch.artifact.clone(), patcher);
    }

    Ok(reconciler)
}

/// Cancel `cancel_token` on SIGINT or SIGTERM.
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, stopping after the current resource...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, stopping after the current resource...");
        }
    }

    cancel_token.cancel();
}

/// Main reconcile command handler. Returns the process exit code.
pub async fn run_reconcile(args: ReconcileArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;
    init_tracing(&config.logging)?;

    let resources = ResourceSpec::from_names(config.resources.iter().cloned())?;
    let reconciler = build_reconciler(
        &config,
        Arc::new(ProcessRunner::new()),
        Arc::new(TokioSleeper),
    )?;

    let cancel_token = CancellationToken::new();
    let signal_handle = tokio::spawn(shutdown_signal(cancel_token.clone()));

    let summary = reconciler.reconcile(&resources, &cancel_token).await;
    signal_handle.abort();
    let summary = summary?;

    if args.json {
        println!("{}", format_summary_json(&summary)?);
    } else {
        println!("{}", format_summary_table(&summary));
    }

    Ok(summary.exit_code())
}
