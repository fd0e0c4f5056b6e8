//! Error types for the trademark core.

use thiserror::Error;

use crate::core::store::StoreError;

/// Errors surfaced by trademark search, lookup and ingestion.
#[derive(Debug, Error)]
pub enum TrademarkError {
    /// The trademark index does not exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Search engine unreachable.
    #[error("Search engine connection failed: {0}")]
    ConnectionFailure(String),

    /// Engine rejected the query or answered unexpectedly.
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// Request parameter failed validation. Raised before any engine call.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No trademark with the requested identifier.
    #[error("Trademark not found: {0}")]
    NotFound(String),

    /// Optimistic update kept losing to concurrent writers.
    #[error("Version conflict updating {pid} after {attempts} attempts")]
    VersionConflict { pid: String, attempts: u32 },

    /// Data file missing or malformed.
    #[error("Data load failed: {0}")]
    DataLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrademarkError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn data_load(msg: impl Into<String>) -> Self {
        Self::DataLoad(msg.into())
    }
}

impl From<StoreError> for TrademarkError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IndexNotFound(index) => Self::IndexNotFound(index),
            StoreError::Connection(msg) => Self::ConnectionFailure(msg),
            StoreError::Query(msg) => Self::QueryExecution(msg),
            StoreError::Serialization(e) => Self::QueryExecution(e.to_string()),
        }
    }
}

/// Result type alias for trademark operations.
pub type Result<T> = std::result::Result<T, TrademarkError>;

/// A derived field could not be computed for one record. Logged and dropped
/// by the normalizer; the record is indexed without that field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot derive {field}: {reason}")]
pub struct NormalizationFieldError {
    pub field: &'static str,
    pub reason: String,
}

impl NormalizationFieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}
