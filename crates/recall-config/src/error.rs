//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while resolving deployment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable was missing and has no default.
    #[error("missing required environment variable '{0}'")]
    MissingVar(String),

    /// An environment variable was present but failed to parse.
    #[error("invalid value for environment variable '{var}': {value}")]
    InvalidVar { var: String, value: String },
}
