//! Error types for the embedding pipeline.

use inlay_sandbox::RunFault;
use thiserror::Error;

/// Reasons an embed is rejected.
///
/// `Display` carries diagnostic detail for logs (paths included).
/// [`EmbedError::user_message`] is the only text shown to visitors.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Target root missing or not a directory, or origin misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Requested extension is not on the allow-list.
    #[error("file type not allowed: {candidate}")]
    DisallowedType { candidate: String },

    /// Candidate does not exist or is not a regular file.
    #[error("target not found: {0}")]
    NotFound(String),

    /// Candidate exists but cannot be opened.
    #[error("target not readable: {0}")]
    Unreadable(String),

    /// Candidate resolves outside the target root.
    #[error("traversal outside target root rejected: {0}")]
    Traversal(String),

    /// The approval hook vetoed the target.
    #[error("target denied by approval hook: {0}")]
    PolicyDenied(String),

    /// The target raised a fault while running.
    #[error("execution fault: {0}")]
    Execution(#[from] RunFault),
}

impl EmbedError {
    /// Fixed, path-free text for the error envelope.
    ///
    /// Only execution faults include detail, and the envelope escapes it.
    pub fn user_message(&self) -> String {
        match self {
            EmbedError::Configuration(_) => "base directory not found".to_string(),
            EmbedError::DisallowedType { .. } => "file type not allowed".to_string(),
            EmbedError::NotFound(_) => "target file not found".to_string(),
            EmbedError::Unreadable(_) => "target file not readable".to_string(),
            EmbedError::Traversal(_) => "access outside allowed directory denied".to_string(),
            EmbedError::PolicyDenied(_) => "access to target denied".to_string(),
            EmbedError::Execution(fault) => format!("execution error: {fault}"),
        }
    }

    /// Short machine-readable kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            EmbedError::Configuration(_) => "configuration",
            EmbedError::DisallowedType { .. } => "disallowed_type",
            EmbedError::NotFound(_) => "not_found",
            EmbedError::Unreadable(_) => "unreadable",
            EmbedError::Traversal(_) => "traversal",
            EmbedError::PolicyDenied(_) => "policy_denied",
            EmbedError::Execution(_) => "execution",
        }
    }
}

/// Result type for embedding operations.
pub type EmbedResult<T> = std::result::Result<T, EmbedError>;
