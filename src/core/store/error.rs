//! Error types for the document store.

use thiserror::Error;

/// Failures reported by a [`DocumentStore`](super::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Target collection (index) does not exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Store unreachable or the transport failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Store rejected the request or answered with something unexpected.
    #[error("Query error: {0}")]
    Query(String),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn index_not_found(index: impl Into<String>) -> Self {
        Self::IndexNotFound(index.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
