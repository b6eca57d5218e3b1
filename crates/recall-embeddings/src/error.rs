//! Error types for the embedding adapter.

use thiserror::Error;

/// Result type alias using the embedding error type.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors surfaced by an [`crate::Embedder`].
///
/// The provider call is retried zero times here: any failure, network,
/// non-2xx status, or malformed response, is surfaced directly so the HTTP
/// layer can turn it into a 502/504.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding provider returned an error: {0}")]
    Provider(String),

    #[error("failed to parse embedding provider response: {0}")]
    Serialization(String),

    #[error("embedding configuration error: {0}")]
    Config(String),

    #[error("local embedding backend error: {0}")]
    Local(String),
}
