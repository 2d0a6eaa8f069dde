//! Error types for config patching.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent a patch from being applied.
///
/// A missing anchor is not an error; it is reported in
/// [`PatchOutcome::missing`](super::PatchOutcome::missing).
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("config artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid anchor expression pattern: {0}")]
    InvalidPattern(String),
}
