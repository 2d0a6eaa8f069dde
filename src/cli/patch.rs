//! Patch command handler

use crate::cli::output::{format_patch_json, format_patch_report};
use crate::cli::{load_config, PatchArgs};
use crate::orchestrator::ResourceSpec;
use crate::patcher::ConfigPatcher;
use crate::poller::{Identifier, ObservedIdentifier};

/// Parse `name=identifier` assignments.
pub fn parse_assignments(
    assignments: &[String],
) -> Result<Vec<ObservedIdentifier>, Box<dyn std::error::Error>> {
    assignments
        .iter()
        .map(|assignment| -> Result<ObservedIdentifier, Box<dyn std::error::Error>> {
            let (name, id) = assignment
                .split_once('=')
                .ok_or_else(|| format!("Expected NAME=ID, got '{}'", assignment))?;
            let resource = ResourceSpec::new(name.trim())?;
            let id = Identifier::parse(id.trim())?;
            Ok(ObservedIdentifier::new(resource.name(), id))
        })
        .collect()
}

/// Handle `provisioner patch` command
pub fn handle_patch(args: &PatchArgs) -> Result<String, Box<dyn std::error::Error>> {
    let mapping = parse_assignments(&args.assignments)?;

    let mut config = load_config(&args.config)?;
    if let Some(ref artifact) = args.artifact {
        config.patch.artifact = artifact.clone();
    }
    let patcher = match &config.patch.expression_pattern {
        Some(pattern) => ConfigPatcher::with_expression(pattern)?,
        None => ConfigPatcher::default(),
    };

    let path = &config.patch.artifact;
    let outcome = patcher.patch_file(path, &mapping)?;

    if args.json {
        Ok(format_patch_json(path, &outcome)?)
    } else {
        Ok(format_patch_report(path, &outcome))
    }
}
