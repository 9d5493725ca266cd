//! Error type shared across the workspace.

use thiserror::Error;

/// Convenient result alias used throughout Prospector.
pub type Result<T> = std::result::Result<T, ProspectorError>;

/// All errors the engine can surface.
#[derive(Debug, Error)]
pub enum ProspectorError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("composer error: {0}")]
    Composer(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProspectorError {
    /// Shorthand for store-layer failures (the store crate maps every
    /// rusqlite error through this).
    pub fn store(e: impl std::fmt::Display) -> Self {
        ProspectorError::Store(e.to_string())
    }

    /// Shorthand for channel failures carrying an upstream reason.
    pub fn channel(e: impl std::fmt::Display) -> Self {
        ProspectorError::Channel(e.to_string())
    }
}
