//! Declared resources.

use super::ReconcileError;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// A named resource to reconcile. Only constructed through validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceSpec {
    name: String,
}

impl ResourceSpec {
    /// Names are non-empty and limited to ASCII letters, digits, `_` and `-`.
    pub fn new(name: impl Into<String>) -> Result<Self, ReconcileError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ReconcileError::InvalidResourceName {
                name,
                reason: "name is empty".to_string(),
            });
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(ReconcileError::InvalidResourceName {
                reason: format!("character {c:?} is not allowed"),
                name,
            });
        }
        Ok(Self { name })
    }

    /// Validate a declared list, keeping its order.
    pub fn from_names<I, S>(names: I) -> Result<Vec<Self>, ReconcileError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let specs = names
            .into_iter()
            .map(Self::new)
            .collect::<Result<Vec<_>, _>>()?;
        validate_list(&specs)?;
        Ok(specs)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The list must be non-empty and free of duplicates.
pub(crate) fn validate_list(resources: &[ResourceSpec]) -> Result<(), ReconcileError> {
    if resources.is_empty() {
        return Err(ReconcileError::EmptyResourceList);
    }
    let mut seen = HashSet::new();
    for resource in resources {
        if !seen.insert(resource.name()) {
            return Err(ReconcileError::DuplicateResource(resource.name.clone()));
        }
    }
    Ok(())
}
