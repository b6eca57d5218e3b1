//! HTTP-boundary error type: maps every internal failure kind onto its
//! HTTP status code and the shared [`recall_types::api::ErrorResponse`] body
//! shape.

use axum::{
    Json,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use recall_types::api::ErrorResponse;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error surfaced at the HTTP boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad input, never reaches storage. Carries every offending field.
    #[error("validation failed")]
    Validation(Vec<String>),

    /// Missing/malformed bearer token, or no agent matches its hash.
    #[error("unauthorized")]
    Unauthorized(String),

    /// Disabled agent, or insufficient trust for an admin operation.
    #[error("forbidden")]
    Forbidden(String),

    /// Unknown memory handle or unknown agent to quarantine.
    #[error("not found: {0}")]
    NotFound(String),

    /// Sliding-window rate limit tripped; carries retry-after seconds.
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// Global write switch is off.
    #[error("writes are currently disabled")]
    WriteDisabled,

    /// The embedding provider failed or timed out; the write transaction is
    /// never opened.
    #[error("upstream dependency error: {0}")]
    Upstream(String),

    /// Unique-constraint conflict that survived bounded retries.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Deployment misconfiguration or other invariant violation; logged
    /// loudly and surfaced as a bare 500.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<recall_storage::StorageError> for ApiError {
    fn from(err: recall_storage::StorageError) -> Self {
        use recall_storage::StorageError as E;
        match err {
            E::NotFound(msg) => ApiError::NotFound(msg),
            E::Conflict(msg) => ApiError::Conflict(msg),
            E::Database(e) => ApiError::Internal(format!("database error: {e}")),
            E::Serialization(e) => ApiError::Internal(format!("serialization error: {e}")),
            E::InvalidHandle(msg) => ApiError::Internal(format!("invalid handle in storage: {msg}")),
            E::Migration(msg) => ApiError::Internal(format!("schema migration error: {msg}")),
            E::Invariant(msg) => ApiError::Internal(format!("invariant violation: {msg}")),
        }
    }
}

impl From<recall_embeddings::EmbeddingError> for ApiError {
    fn from(err: recall_embeddings::EmbeddingError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<recall_types::Error> for ApiError {
    fn from(err: recall_types::Error) -> Self {
        use recall_types::Error as E;
        match err {
            E::Validation(msg) => ApiError::Validation(vec![msg]),
            E::NotFound(msg) => ApiError::NotFound(msg),
            E::Conflict(msg) => ApiError::Conflict(msg),
            E::Upstream(msg) => ApiError::Upstream(msg),
            E::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::WriteDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Conflict(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::WriteDisabled => "write_disabled",
            ApiError::Upstream(_) => "upstream_error",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ApiError::Internal(msg) | ApiError::Conflict(msg) => {
                tracing::error!(status = %status, error = %msg, "internal failure");
            }
            ApiError::Upstream(msg) => {
                tracing::warn!(status = %status, error = %msg, "upstream dependency failure");
            }
            _ => {
                tracing::debug!(status = %status, error = %self, "request rejected");
            }
        }

        let retry_after = match &self {
            ApiError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        let fields = match &self {
            ApiError::Validation(fields) => fields.clone(),
            _ => Vec::new(),
        };

        let body = ErrorResponse {
            success: false,
            error: self.error_code().to_string(),
            detail: self.to_string(),
            retry_after,
            fields,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}
