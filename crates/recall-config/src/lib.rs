//! Deployment configuration for the Recall service.
//!
//! Everything here is environment-variable driven: database location,
//! the rate-limit/cache key-value store URL, embedding provider credentials,
//! and the write-pipeline thresholds. There is no project-local config file —
//! this is a long-running service, not a per-user CLI tool.

pub mod error;
pub mod settings;

pub use error::{ConfigError, Result};
pub use settings::{EmbeddingProvider, Settings};
