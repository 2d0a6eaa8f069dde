//! Config artifact patching.
//!
//! Rewrites the quoted value slot of per-resource anchors of the shape
//!
//! ```text
//!   <name>: <expression> || '<value>'
//! ```
//!
//! leaving every other byte of the artifact untouched. Because the value slot
//! itself is the target, patching is idempotent.

mod error;

pub use error::PatchError;

use crate::poller::ObservedIdentifier;
use regex::{Captures, Regex};
use serde::Serialize;
use std::path::Path;

/// Default expression matcher: anything on the line except quotes.
pub const DEFAULT_EXPRESSION_PATTERN: &str = r"[^'\n]*?";

/// Result of patching a text artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchOutcome {
    #[serde(skip)]
    pub text: String,
    /// Whether `text` differs from the input
    pub changed: bool,
    /// Resources whose anchor was found and rewritten
    pub applied: Vec<String>,
    /// Resources without an anchor in the artifact
    pub missing: Vec<String>,
}

/// Applies identifier mappings to anchors in a text artifact.
#[derive(Debug, Clone)]
pub struct ConfigPatcher {
    expression: String,
}

impl Default for ConfigPatcher {
    fn default() -> Self {
        Self {
            expression: DEFAULT_EXPRESSION_PATTERN.to_string(),
        }
    }
}

impl ConfigPatcher {
    /// Build a patcher whose anchors only accept expressions matching
    /// `expression_pattern`.
    ///
    /// # Errors
    ///
    /// Returns `PatchError::InvalidPattern` if the pattern is not a valid regex.
    pub fn with_expression(expression_pattern: &str) -> Result<Self, PatchError> {
        let patcher = Self {
            expression: expression_pattern.to_string(),
        };
        patcher.anchor("probe")?;
        Ok(patcher)
    }

    /// Line-level anchor for `name`; group 1 is everything before the value.
    fn anchor(&self, name: &str) -> Result<Regex, PatchError> {
        let pattern = format!(
            r#"(?m)^([ \t]*["']?{name}["']?[ \t]*:[ \t]*(?:{expr})[ \t]*\|\|[ \t]*)'[^'\n]*'"#,
            name = regex::escape(name),
            expr = self.expression,
        );
        Regex::new(&pattern).map_err(|e| PatchError::InvalidPattern(e.to_string()))
    }

    /// Whether `text` declares an anchor for `name`.
    pub fn has_anchor(&self, text: &str, name: &str) -> Result<bool, PatchError> {
        Ok(self.anchor(name)?.is_match(text))
    }

    /// Apply `mapping` to `text`.
    ///
    /// Names without an anchor are skipped and reported in `missing`.
    pub fn patch(
        &self,
        text: &str,
        mapping: &[ObservedIdentifier],
    ) -> Result<PatchOutcome, PatchError> {
        let mut current = text.to_string();
        let mut applied = Vec::new();
        let mut missing = Vec::new();

        for observed in mapping {
            let anchor = self.anchor(&observed.resource)?;
            if !anchor.is_match(&current) {
                tracing::warn!(
                    resource = %observed.resource,
                    "Anchor not found in config artifact, skipping"
                );
                missing.push(observed.resource.clone());
                continue;
            }

            current = anchor
                .replace_all(&current, |caps: &Captures| {
                    format!("{}'{}'", &caps[1], observed.id)
                })
                .into_owned();
            applied.push(observed.resource.clone());
        }

        Ok(PatchOutcome {
            changed: current != text,
            text: current,
            applied,
            missing,
        })
    }

    /// Patch the artifact at `path` in place.
    ///
    /// The file is only written when its content changes.
    pub fn patch_file(
        &self,
        path: &Path,
        mapping: &[ObservedIdentifier],
    ) -> Result<PatchOutcome, PatchError> {
        if !path.exists() {
            return Err(PatchError::NotFound(path.to_path_buf()));
        }
        let original = std::fs::read_to_string(path)?;
        let outcome = self.patch(&original, mapping)?;

        if outcome.changed {
            std::fs::write(path, &outcome.text)?;
            tracing::info!(
                path = %path.display(),
                applied = ?outcome.applied,
                "Config artifact updated"
            );
        } else {
            tracing::info!(path = %path.display(), "Config artifact already up to date");
        }

        Ok(outcome)
    }
}
