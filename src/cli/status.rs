//! Status command handler

use crate::cli::output::{format_status_json, format_status_table, StatusView};
use crate::cli::{load_config, StatusArgs};
use crate::orchestrator::ResourceSpec;
use crate::poller::{AttemptOutcome, StatusPoller, TokioSleeper};
use crate::runner::{CommandRunner, ProcessRunner};
use crate::tool::ProvisioningTool;
use std::sync::Arc;

/// Run one status query per resource, without launching anything.
pub async fn collect_status(
    tool: &ProvisioningTool,
    resources: &[ResourceSpec],
    account: Option<&str>,
    runner: Arc<dyn CommandRunner>,
) -> Result<Vec<StatusView>, Box<dyn std::error::Error>> {
    let poller = StatusPoller::new(runner, Arc::new(TokioSleeper));
    let mut rows = Vec::with_capacity(resources.len());

    for resource in resources {
        let spec = tool.status_command(resource.name(), account)?;
        let row = match poller.attempt(&spec).await {
            AttemptOutcome::Confirmed(id) => StatusView {
                resource: resource.name().to_string(),
                identifier: Some(id.to_string()),
                detail: None,
            },
            AttemptOutcome::Inconclusive(reason) => StatusView {
                resource: resource.name().to_string(),
                identifier: None,
                detail: Some(reason.to_string()),
            },
        };
        rows.push(row);
    }

    Ok(rows)
}

/// Handle `provisioner status` command
pub async fn handle_status(args: &StatusArgs) -> Result<String, Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)?;
    if !args.resources.is_empty() {
        config.resources = args.resources.clone();
    }
    config.validate()?;

    let resources = ResourceSpec::from_names(config.resources.iter().cloned())?;
    let tool = ProvisioningTool::from_config(&config);
    let rows = collect_status(
        &tool,
        &resources,
        config.account.fallback.as_deref(),
        Arc::new(ProcessRunner::new()),
    )
    .await?;

    if args.json {
        Ok(format_status_json(&rows)?)
    } else {
        Ok(format_status_table(&rows))
    }
}
