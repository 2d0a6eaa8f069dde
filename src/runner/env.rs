//! Explicit per-command environment overrides.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Environment changes applied to a child process, never to the caller.
///
/// Removals are applied first, then `set`, so an explicitly set variable
/// survives a matching `remove_containing` entry (`NO_COLOR` vs `COLOR`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvOverrides {
    /// Variables to set or replace
    pub set: BTreeMap<String, String>,
    /// Variables to remove by exact name
    pub remove: BTreeSet<String>,
    /// Remove every inherited variable whose name contains one of these
    /// substrings (case-insensitive)
    pub remove_containing: Vec<String>,
}

impl EnvOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set.insert(key.into(), value.into());
        self
    }

    /// Remove a variable by exact name.
    pub fn without_var(mut self, key: impl Into<String>) -> Self {
        self.remove.insert(key.into());
        self
    }

    /// Remove every variable whose name contains `fragment`.
    pub fn without_vars_containing(mut self, fragment: impl Into<String>) -> Self {
        self.remove_containing.push(fragment.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty() && self.remove_containing.is_empty()
    }

    /// Compute which of the inherited variable names must be removed.
    ///
    /// Names that are explicitly `set` are never reported.
    pub fn removals<'a, I>(&self, inherited: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fragments: Vec<String> = self
            .remove_containing
            .iter()
            .map(|f| f.to_uppercase())
            .collect();

        let mut removed: BTreeSet<String> = inherited
            .into_iter()
            .filter(|key| {
                let upper = key.to_uppercase();
                fragments.iter().any(|f| upper.contains(f.as_str()))
            })
            .map(str::to_string)
            .collect();
        removed.extend(self.remove.iter().cloned());
        removed.retain(|key| !self.set.contains_key(key));
        removed
    }

    /// Apply the overrides to a command about to be spawned.
    pub fn apply(&self, cmd: &mut tokio::process::Command) {
        let inherited: Vec<String> = std::env::vars_os()
            .filter_map(|(key, _)| key.into_string().ok())
            .collect();

        for key in self.removals(inherited.iter().map(String::as_str)) {
            cmd.env_remove(key);
        }
        cmd.envs(&self.set);
    }
}
