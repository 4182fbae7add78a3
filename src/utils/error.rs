//! Error handling for the batch workflow engine.

use crate::core::reference::LocalId;
use thiserror::Error;

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, BatchError>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum BatchError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential rejected by the token endpoint
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Connectivity, timeout, or unparseable-response failures
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote returned a different entry count than was submitted
    #[error("Response shape mismatch: submitted {expected} entries, received {actual}")]
    ResponseShapeMismatch {
        /// Entries in the submitted batch
        expected: usize,
        /// Entries in the parsed response
        actual: usize,
    },

    /// Local serialization or payload-structure bug
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// One batch entry reported failure
    #[error("Operation at entry {index} failed: {detail}")]
    OperationFailed {
        /// Position of the failing entry in the batch
        index: usize,
        /// Server-provided error text
        detail: String,
    },

    /// A local id was resolved more than once
    #[error("Duplicate resolution for local reference {0}")]
    DuplicateResolution(LocalId),
}

impl From<serde_json::Error> for BatchError {
    fn from(error: serde_json::Error) -> Self {
        BatchError::MalformedPayload(error.to_string())
    }
}

impl BatchError {
    /// Whether a production wrapper may retry the failed call with backoff.
    ///
    /// Transport failures are transient; everything else in the taxonomy
    /// indicates a credential, protocol, or programming problem that a retry
    /// cannot fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BatchError::Transport(_))
    }

    /// Whether the error came from the credential exchange.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, BatchError::Authentication(_))
    }
}
