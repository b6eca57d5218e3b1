//! Short-TTL search cache: memoizes `(query, limit) -> result rows` for 120
//! seconds over the same key-value client the rate limiter uses.
//! Retrieval-event logging is never part of what's cached — it runs on
//! every call regardless of hit or miss.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::kv::KvStore;

const TTL_SECONDS: u64 = 120;
const KEY_DIGEST_LEN: usize = 16;

/// A cached search row: pre-projection, so identical queries share one entry
/// across agents regardless of who eventually reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRow {
    pub id: String,
    pub short_id: String,
    pub agent_id: String,
    pub author_name: String,
    pub content: String,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub created_at: String,
    pub similarity: f64,
    pub retrieval_count: i64,
}

fn cache_key(query: &str, limit: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{query}:{limit}").as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("search_cache:{}", &hex[..KEY_DIGEST_LEN])
}

/// Look up cached rows for `(query, limit)`.
pub async fn get(kv: &dyn KvStore, query: &str, limit: usize) -> Result<Option<Vec<CachedRow>>> {
    let key = cache_key(query, limit);
    match kv.get(&key).await? {
        Some(raw) => Ok(serde_json::from_str(&raw).ok()),
        None => Ok(None),
    }
}

/// Store rows for `(query, limit)` with the fixed 120s TTL.
pub async fn put(kv: &dyn KvStore, query: &str, limit: usize, rows: &[CachedRow]) -> Result<()> {
    let key = cache_key(query, limit);
    let raw = serde_json::to_string(rows)
        .map_err(|e| crate::error::ApiError::Internal(format!("cache serialization: {e}")))?;
    kv.set_ex(&key, &raw, TTL_SECONDS).await
}
