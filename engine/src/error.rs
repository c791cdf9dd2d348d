//! Error types for the Marginalia engine.

use thiserror::Error;

/// All possible errors from the reconciliation engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("invalid local mutations for {key}: {reason}")]
    InvalidLocalMutations { key: String, reason: String },

    #[error("local deletion {local_id} has no remote id")]
    DeletionWithoutRemoteId { local_id: String },

    // Resolution errors
    #[error("illegal conflict ({reason}): local {local}, remote {remote}")]
    IllegalConflict {
        reason: String,
        local: String,
        remote: String,
    },

    // Wire errors
    #[error("invalid payload for {resource}: {reason}")]
    InvalidPayload { resource: String, reason: String },

    #[error("{resource} mutation has no resource id")]
    MissingRemoteId { resource: String },

    #[error("unexpected resource: expected {expected}, got {got}")]
    UnexpectedResource { expected: String, got: String },

    #[error("collection bookmark references unresolved bookmark {bookmark_id:?}")]
    UnresolvedBookmark { bookmark_id: Option<String> },
}

impl Error {
    pub(crate) fn invalid_payload(resource: &str, reason: impl ToString) -> Self {
        Error::InvalidPayload {
            resource: resource.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
