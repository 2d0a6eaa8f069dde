//! Error types for command execution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`CommandRunner`](super::CommandRunner).
///
/// A non-zero exit status or an elapsed timeout is *not* an error; both are
/// reported through [`CommandOutput`](super::CommandOutput).
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The process could not be started at all
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The background log file could not be opened
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or signalling a running process failed
    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),
}
