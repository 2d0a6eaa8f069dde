//! Output formatting helpers for CLI commands

use crate::orchestrator::{ConfigUpdate, RunStatus, RunSummary};
use crate::patcher::PatchOutcome;
use crate::supervisor::{AttemptState, ProvisionOutcome};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use serde_json::json;
use std::path::Path;

/// One row of `provisioner status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

fn state_label(state: AttemptState) -> String {
    match state {
        AttemptState::Confirmed => "Confirmed".green().to_string(),
        AttemptState::Abandoned => "Abandoned".red().to_string(),
        AttemptState::Launched => "Launched".yellow().to_string(),
        AttemptState::NotStarted => "Not started".dimmed().to_string(),
    }
}

fn outcome_detail(outcome: &ProvisionOutcome) -> String {
    match (&outcome.error, outcome.adopted) {
        (Some(error), _) => error.to_string(),
        (None, true) => "already provisioned".to_string(),
        (None, false) => String::new(),
    }
}

/// Format a run summary as a table followed by a short report
pub fn format_summary_table(summary: &RunSummary) -> String {
    let mut table = new_table(vec![
        "Resource",
        "State",
        "Identifier",
        "Attempts",
        "Launcher",
        "Detail",
    ]);

    for outcome in &summary.outcomes {
        table.add_row(vec![
            Cell::new(&outcome.resource),
            Cell::new(state_label(outcome.state)),
            Cell::new(
                outcome
                    .identifier
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(outcome.attempts),
            Cell::new(
                outcome
                    .launcher_exit
                    .map(|exit| exit.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(outcome_detail(outcome)),
        ]);
    }

    let mut lines = vec![table.to_string()];

    let account = match (&summary.account.identifier, &summary.account.balance) {
        (Some(id), Some(balance)) => format!("Account: {} (balance: {})", id, balance),
        (Some(id), None) => format!("Account: {}", id),
        (None, _) => "Account: unavailable".to_string(),
    };
    lines.push(account);
    lines.push(format!("Config: {}", describe_config_update(&summary.config)));
    if summary.cancelled {
        lines.push("Run cancelled".yellow().to_string());
    }

    let status = match summary.status() {
        RunStatus::Complete => "✓ All resources confirmed".green().to_string(),
        RunStatus::Partial => {
            let text = format!(
                "~ {} confirmed, {} unresolved",
                summary.result.mapping.len(),
                summary.result.unresolved.len()
            );
            text.yellow().to_string()
        }
        RunStatus::NoResourcesConfirmed => "✗ No resources confirmed".red().to_string(),
    };
    lines.push(status);

    lines.join("\n")
}

fn describe_config_update(update: &ConfigUpdate) -> String {
    fn missing_note(missing: &[String]) -> String {
        if missing.is_empty() {
            String::new()
        } else {
            format!(" (no anchor for: {})", missing.join(", "))
        }
    }

    match update {
        ConfigUpdate::Disabled => "not updated (disabled)".to_string(),
        ConfigUpdate::Skipped { reason } => format!("not updated ({})", reason),
        ConfigUpdate::Unchanged { path, missing, .. } => {
            format!("{} already up to date{}", path.display(), missing_note(missing))
        }
        ConfigUpdate::Patched {
            path,
            applied,
            missing,
        } => format!(
            "{} updated for {}{}",
            path.display(),
            applied.join(", "),
            missing_note(missing)
        ),
        ConfigUpdate::Failed { path, error } => {
            format!("{} {}: {}", "failed to update".red(), path.display(), error)
        }
    }
}

/// Format a run summary as JSON
pub fn format_summary_json(summary: &RunSummary) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(summary)?;
    value["status"] = json!(summary.status());
    value["exit_code"] = json!(summary.exit_code());
    serde_json::to_string_pretty(&value)
}

/// Format status rows as a table
pub fn format_status_table(rows: &[StatusView]) -> String {
    let mut table = new_table(vec!["Resource", "Identifier", "Detail"]);

    for row in rows {
        let identifier = match &row.identifier {
            Some(id) => id.green().to_string(),
            None => "not found".red().to_string(),
        };
        table.add_row(vec![
            Cell::new(&row.resource),
            Cell::new(identifier),
            Cell::new(row.detail.as_deref().unwrap_or("")),
        ]);
    }

    table.to_string()
}

/// Format status rows as JSON
pub fn format_status_json(rows: &[StatusView]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({ "resources": rows }))
}

/// Format the result of a manual patch
pub fn format_patch_report(path: &Path, outcome: &PatchOutcome) -> String {
    let mut lines = Vec::new();
    if outcome.changed {
        lines.push(format!(
            "{} {} updated for {}",
            "✓".green(),
            path.display(),
            outcome.applied.join(", ")
        ));
    } else {
        lines.push(format!("{} {} already up to date", "✓".green(), path.display()));
    }
    for name in &outcome.missing {
        lines.push(format!("{} no anchor for '{}'", "!".yellow(), name));
    }
    lines.join("\n")
}

/// Format the result of a manual patch as JSON
pub fn format_patch_json(path: &Path, outcome: &PatchOutcome) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({
        "path": path,
        "changed": outcome.changed,
        "applied": outcome.applied,
        "missing": outcome.missing,
    }))
}
