//! Error types for execution.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while setting up a runner.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Runner configuration is unusable.
    #[error("Invalid execution configuration: {0}")]
    ConfigError(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;

/// A fault raised by the target while it ran.
///
/// Faults are data, not errors: the executor reports them alongside the
/// partial output instead of propagating them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFault {
    /// The interpreter could not be started.
    #[error("failed to start interpreter: {0}")]
    Spawn(String),

    /// The interpreter exited unsuccessfully.
    #[error("target exited with {}{}", status_text(.code), detail_text(.detail))]
    Exited { code: Option<i32>, detail: String },

    /// Execution exceeded the configured timeout.
    #[error("target timed out after {0:?}")]
    TimedOut(Duration),

    /// The target reported an error.
    #[error("{0}")]
    Raised(String),

    /// In-process target code panicked.
    #[error("target panicked: {0}")]
    Panicked(String),
}

fn status_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

fn detail_text(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}
