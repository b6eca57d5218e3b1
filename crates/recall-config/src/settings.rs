//! Deployment-time settings, resolved from environment variables.
//!
//! This service has no per-user config directory to merge, so a single
//! `Settings::from_env` pass (optionally preceded by loading a `.env` file
//! via `dotenvy`, for local secrets during development) is sufficient.

use std::env;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Embedding backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingProvider {
    OpenAi,
    Local,
    TestStub,
}

impl EmbeddingProvider {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "openai" => Ok(EmbeddingProvider::OpenAi),
            "local" => Ok(EmbeddingProvider::Local),
            "test-stub" | "mock" => Ok(EmbeddingProvider::TestStub),
            other => Err(ConfigError::InvalidVar {
                var: "EMBEDDING_PROVIDER".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Full set of deployment settings read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the SQLite database file (`:memory:` is accepted for tests).
    pub database_path: String,
    /// Redis-compatible URL backing the rate limiter and search cache.
    pub redis_url: String,
    /// Address the HTTP server binds to.
    pub bind_addr: String,

    pub embedding_provider: EmbeddingProvider,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub openai_api_key: Option<String>,
    pub local_model_path: Option<std::path::PathBuf>,
    pub local_tokenizer_path: Option<std::path::PathBuf>,

    pub min_similarity: f64,
    pub duplicate_threshold: f64,
    pub auto_duplicate_threshold: f64,
    pub min_content_length: usize,

    /// Deadline for the outbound embedding provider HTTP call.
    pub embedding_timeout: Duration,
}

impl Settings {
    /// Load settings from the process environment, loading a `.env` file
    /// first if one is present (no-op otherwise).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_env_vars()
    }

    fn from_env_vars() -> Result<Self> {
        let provider = EmbeddingProvider::parse(
            &env_or(
                "EMBEDDING_PROVIDER",
                if env::var("OPENAI_API_KEY").is_ok() {
                    "openai"
                } else {
                    "test-stub"
                },
            ),
        )?;

        Ok(Settings {
            database_path: env_or("DATABASE_PATH", "./recall.db"),
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1:6379/0"),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),

            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dim: env_parse_or("EMBEDDING_DIM", 1536)?,
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            local_model_path: env::var("LOCAL_EMBEDDING_MODEL_PATH").ok().map(Into::into),
            local_tokenizer_path: env::var("LOCAL_EMBEDDING_TOKENIZER_PATH")
                .ok()
                .map(Into::into),
            embedding_provider: provider,

            min_similarity: env_parse_or("MIN_SIMILARITY", 0.55)?,
            duplicate_threshold: env_parse_or("DUPLICATE_THRESHOLD", 0.92)?,
            auto_duplicate_threshold: env_parse_or("AUTO_DUPLICATE_THRESHOLD", 0.97)?,
            min_content_length: env_parse_or("MIN_CONTENT_LENGTH", 80)?,

            embedding_timeout: Duration::from_secs(30),
        })
    }

    /// Settings suitable for integration tests: in-memory database, no
    /// external embedding provider, nonexistent Redis URL (tests inject a
    /// fake `RateLimitStore`/cache instead of dialing it).
    pub fn for_tests() -> Self {
        Settings {
            database_path: ":memory:".to_string(),
            redis_url: "redis://127.0.0.1:0/0".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            embedding_provider: EmbeddingProvider::TestStub,
            embedding_model: "test-stub".to_string(),
            embedding_dim: 32,
            openai_api_key: None,
            local_model_path: None,
            local_tokenizer_path: None,
            min_similarity: 0.55,
            duplicate_threshold: 0.92,
            auto_duplicate_threshold: 0.97,
            min_content_length: 80,
            embedding_timeout: Duration::from_secs(30),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidVar {
            var: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in [
            "DATABASE_PATH",
            "REDIS_URL",
            "BIND_ADDR",
            "EMBEDDING_PROVIDER",
            "OPENAI_API_KEY",
            "MIN_SIMILARITY",
        ] {
            unsafe { env::remove_var(key) };
        }
        let settings = Settings::from_env_vars().unwrap();
        assert_eq!(settings.database_path, "./recall.db");
        assert_eq!(settings.embedding_provider, EmbeddingProvider::TestStub);
        assert!((settings.min_similarity - 0.55).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_numeric_override_is_reported() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe { env::set_var("MIN_SIMILARITY", "not-a-number") };
        let result = Settings::from_env_vars();
        unsafe { env::remove_var("MIN_SIMILARITY") };
        assert!(result.is_err());
    }
}
