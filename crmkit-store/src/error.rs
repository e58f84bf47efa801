//! Error types for record stores

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur reading or writing record collections
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer holds the collection
    #[error("collection '{key}' is locked by another writer")]
    LockBusy { key: String },

    /// Record not found in a collection
    #[error("record not found: {key}/{id}")]
    RecordNotFound { key: String, id: String },

    /// Backend cannot be reached (e.g. offline)
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Whether a fallback store should be tried instead.
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. } | StoreError::Io(_))
    }
}
