//! Error types shared across the Recall crates.

use thiserror::Error;

/// Result type alias using the Recall error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for domain-level failures.
///
/// Storage- and transport-specific errors (`recall-storage::StorageError`,
/// `recall-server::ApiError`) convert into and out of this type at crate
/// boundaries rather than duplicating its variants.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream dependency error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}
