use std::io;
use thiserror::Error;

/// Custom error type for the selfmon library
#[derive(Error, Debug)]
pub enum SelfmonError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Host introspection unavailable: {0}")]
    Introspection(String),

    #[error("Server error: {0}")]
    Server(String),
}

/// Result type alias for the selfmon library
pub type Result<T> = std::result::Result<T, SelfmonError>;

impl SelfmonError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SelfmonError::Config(msg.into())
    }

    /// Create an introspection error (host query failed or is unsupported)
    pub fn introspection<S: Into<String>>(msg: S) -> Self {
        SelfmonError::Introspection(msg.into())
    }

    pub fn server<S: Into<String>>(msg: S) -> Self {
        SelfmonError::Server(msg.into())
    }
}
