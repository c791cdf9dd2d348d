//! Unified error handling for the sync client.

use std::fmt::Display;

use crate::config::ConfigError;

/// Sync client error type.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Engine error: {0}")]
    Engine(#[from] marginalia_engine::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Server rejected request: {0}")]
    Rejected(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sync incomplete, failed resources: {}", failed.join(", "))]
    Incomplete { failed: Vec<String> },

    #[error("Sync cycle cancelled")]
    Cancelled,
}

impl SyncError {
    /// Wrap a failure reported by a storage collaborator.
    pub fn storage(err: impl Display) -> Self {
        SyncError::Storage(err.to_string())
    }
}

/// Result type alias for the sync client.
pub type Result<T> = std::result::Result<T, SyncError>;
