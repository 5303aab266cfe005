//! Error types for agentop-core

use thiserror::Error;

/// Main error type for the agentop-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Pricing resolution error
    #[error("pricing error: {0}")]
    Pricing(String),
}

/// Result type alias for agentop-core
pub type Result<T> = std::result::Result<T, Error>;
