use thiserror::Error;

/// Top-level error type for Leadflow.
#[derive(Debug, Error)]
pub enum LeadflowError {
    /// Error from the chat-platform send API.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Error from the AI responder.
    #[error("ai error: {0}")]
    Ai(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Memory/storage error.
    #[error("memory error: {0}")]
    Memory(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
