//! Errors that abort a reconciliation run before any resource is launched.

use crate::tool::TemplateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no resources declared")]
    EmptyResourceList,

    #[error("invalid resource name '{name}': {reason}")]
    InvalidResourceName { name: String, reason: String },

    #[error("resource '{0}' is declared more than once")]
    DuplicateResource(String),

    #[error("cannot render commands: {0}")]
    Template(#[from] TemplateError),
}
