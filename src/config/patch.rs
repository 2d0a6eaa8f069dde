//! Config artifact patch configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where discovered identifiers are written after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    pub enabled: bool,
    /// Text artifact holding one anchor per resource
    pub artifact: PathBuf,
    /// Regex the expression before `||` must match; any quote-free
    /// expression when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_pattern: Option<String>,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            artifact: PathBuf::from("frontend/src/services/canisterConfig.ts"),
            expression_pattern: None,
        }
    }
}
