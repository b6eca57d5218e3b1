//! The shared key-value client backing the rate limiter and the search
//! cache.
//!
//! Both subsystems pipeline a handful of primitive commands against the same
//! Redis-compatible store. [`KvStore`] names exactly the primitives they
//! need so tests can inject an in-process fake without a running Redis.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{ApiError, Result};

/// Primitive key-value operations shared by the rate limiter and the search
/// cache. The rate limiter's five-step pipeline is a batch of these commands
/// sent together, not a transaction — the store is free to execute them one
/// at a time.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Remove sorted-set members with score `<= max_score`.
    async fn zremrangebyscore(&self, key: &str, max_score: f64) -> Result<()>;
    /// Add a member at the given score (score doubles as the member string).
    async fn zadd(&self, key: &str, score: f64) -> Result<()>;
    /// Cardinality of the sorted set.
    async fn zcard(&self, key: &str) -> Result<i64>;
    /// Set (or refresh) the key's TTL, in seconds.
    async fn expire(&self, key: &str, seconds: i64) -> Result<()>;
    /// Score of the oldest remaining member, if any.
    async fn zmin_score(&self, key: &str) -> Result<Option<f64>>;

    /// Cache read.
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Cache write with a TTL, in seconds.
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Redis-backed implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Redis-backed [`KvStore`].
///
/// Holds a `redis::aio::ConnectionManager`, the process-wide singleton
/// client built once behind a `tokio::sync::OnceCell` so concurrent callers
/// racing to connect on first use share one connection rather than dialing
/// twice.
pub struct RedisKv {
    cell: tokio::sync::OnceCell<redis::aio::ConnectionManager>,
    url: String,
}

impl RedisKv {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            cell: tokio::sync::OnceCell::new(),
            url: url.into(),
        }
    }

    async fn conn(&self) -> Result<redis::aio::ConnectionManager> {
        self.cell
            .get_or_try_init(|| async {
                let client = redis::Client::open(self.url.clone())
                    .map_err(|e| ApiError::Internal(format!("invalid redis url: {e}")))?;
                client
                    .get_connection_manager()
                    .await
                    .map_err(|e| ApiError::Internal(format!("redis connect failed: {e}")))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn zremrangebyscore(&self, key: &str, max_score: f64) -> Result<()> {
        let mut conn = self.conn().await?;
        redis::cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(max_score)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| ApiError::Internal(format!("redis zremrangebyscore: {e}")))
    }

    async fn zadd(&self, key: &str, score: f64) -> Result<()> {
        let mut conn = self.conn().await?;
        redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(score.to_string())
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| ApiError::Internal(format!("redis zadd: {e}")))
    }

    async fn zcard(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn().await?;
        redis::cmd("ZCARD")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| ApiError::Internal(format!("redis zcard: {e}")))
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| ApiError::Internal(format!("redis expire: {e}")))
    }

    async fn zmin_score(&self, key: &str) -> Result<Option<f64>> {
        let mut conn = self.conn().await?;
        let rows: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(0)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await
            .map_err(|e| ApiError::Internal(format!("redis zrange: {e}")))?;
        Ok(rows.into_iter().next().map(|(_, score)| score))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| ApiError::Internal(format!("redis get: {e}")))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| ApiError::Internal(format!("redis set: {e}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-process fake (tests)
// ─────────────────────────────────────────────────────────────────────────────

/// In-process fake used by tests so the full request path runs without a
/// running Redis.
#[derive(Default)]
pub struct InMemoryKv {
    sorted_sets: Mutex<HashMap<String, Vec<f64>>>,
    strings: Mutex<HashMap<String, String>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn zremrangebyscore(&self, key: &str, max_score: f64) -> Result<()> {
        let mut sets = self.sorted_sets.lock().unwrap();
        if let Some(set) = sets.get_mut(key) {
            set.retain(|score| *score > max_score);
        }
        Ok(())
    }

    async fn zadd(&self, key: &str, score: f64) -> Result<()> {
        let mut sets = self.sorted_sets.lock().unwrap();
        sets.entry(key.to_string()).or_default().push(score);
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<i64> {
        let sets = self.sorted_sets.lock().unwrap();
        Ok(sets.get(key).map(|s| s.len() as i64).unwrap_or(0))
    }

    async fn expire(&self, _key: &str, _seconds: i64) -> Result<()> {
        // No-op: the in-memory fake never persists across process restarts,
        // so TTL bookkeeping has nothing to simulate.
        Ok(())
    }

    async fn zmin_score(&self, key: &str) -> Result<Option<f64>> {
        let sets = self.sorted_sets.lock().unwrap();
        Ok(sets
            .get(key)
            .and_then(|s| s.iter().cloned().fold(None, |acc, v| match acc {
                None => Some(v),
                Some(min) => Some(if v < min { v } else { min }),
            })))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let strings = self.strings.lock().unwrap();
        Ok(strings.get(key).cloned())
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl_seconds: u64) -> Result<()> {
        let mut strings = self.strings.lock().unwrap();
        strings.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
