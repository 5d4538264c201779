//! Error types for the Switch gateway process

use thiserror::Error;

/// Process-level error type (startup, configuration, serving)
///
/// Request-level failures never surface here; they are mapped to HTTP
/// responses by [`crate::gateway::GatewayResponse`].
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors (bad file, bad URL, missing API key)
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors (bind, serve)
    #[error("Server error: {0}")]
    Server(String),

    /// Persistent store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gateway process operations
pub type Result<T> = std::result::Result<T, GatewayError>;
