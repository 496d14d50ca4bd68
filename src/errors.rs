//! Error types for the financial bot
//!
//! Every failure surfaces unmodified to the caller. Backend adapters fold
//! their client errors into `UpstreamService`, naming the service that failed.

use thiserror::Error;

/// Main error type for the question-answering pipeline
#[derive(Error, Debug)]
pub enum BotError {
    /// Embedding, vector store or generation backend failure
    #[error("Upstream service '{service}' failed: {message}")]
    UpstreamService { service: String, message: String },

    /// A template placeholder or chain input had no value
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Caller supplied input that a stage cannot accept
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Chains wired together with unsatisfied inputs or clashing outputs
    #[error("Chain composition error: {0}")]
    Composition(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, BotError>;

impl BotError {
    /// Build an upstream failure for the named service
    pub fn upstream(service: impl Into<String>, message: impl ToString) -> Self {
        BotError::UpstreamService {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Whether the failure came from an external collaborator
    pub fn is_upstream(&self) -> bool {
        matches!(self, BotError::UpstreamService { .. })
    }
}
