//! Error types for the storage layer.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (short-id or api-key-hash collision).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid handle (bad UUID / short-id shape) passed to a lookup.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// Schema or pragma setup failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// An internal invariant was violated (e.g. vector dimension mismatch).
    /// Indicates a deployment misconfiguration and should be logged loudly.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
