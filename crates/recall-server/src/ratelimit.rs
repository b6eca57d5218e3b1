//! Multi-window sliding-window-log rate limiter.
//!
//! A single pipelined batch per window: trim expired entries, add the
//! current one, read cardinality, refresh TTL, peek the oldest remaining
//! entry. Several `(max, window)` pairs can apply to the same
//! `(principal, endpoint)`; every window is checked and a denial
//! short-circuits on the first offending one. This is NOT a database
//! transaction — the store just runs the commands in order.

use std::time::{SystemTime, UNIX_EPOCH};

use recall_types::TrustLevel;

use crate::error::{ApiError, Result};
use crate::kv::KvStore;

/// One `(max_requests, window)` rule.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub max_requests: u32,
    pub seconds: u64,
}

const fn w(max_requests: u32, seconds: u64) -> Window {
    Window { max_requests, seconds }
}

/// Default rule for endpoints absent from the table.
pub const DEFAULT_WINDOWS: &[Window] = &[w(10, 60)];

/// Per-IP rule for unauthenticated registration.
pub const REGISTER_IP_WINDOWS: &[Window] = &[w(5, 3600)];

/// Rule table: endpoint + trust level -> windows.
pub fn windows_for(endpoint: &str, trust: TrustLevel) -> &'static [Window] {
    match (endpoint, trust) {
        ("memory:write", TrustLevel::UNVERIFIED) => &[w(1, 60), w(2, 86_400)],
        ("memory:write", TrustLevel::TRUSTED) => &[w(5, 60), w(50, 86_400)],
        ("memory:write", _) => &[w(10, 60), w(200, 86_400)],
        ("memory:search", TrustLevel::UNVERIFIED) => &[w(30, 60)],
        ("memory:search", _) => &[w(120, 60)],
        ("memory:get", TrustLevel::UNVERIFIED) => &[w(60, 60)],
        ("memory:get", _) => &[w(300, 60)],
        _ => DEFAULT_WINDOWS,
    }
}

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Run the rate-limit pipeline for one window and report whether it trips.
/// Returns `Some(retry_after)` on denial.
async fn check_window(kv: &dyn KvStore, key: &str, window: Window) -> Result<Option<u64>> {
    let now = now_seconds();

    kv.zremrangebyscore(key, now - window.seconds as f64).await?;
    // The entry is added before counting: `max_requests = N` permits
    // exactly N within the window, and the rejected (N+1)-th entry simply
    // ages out like any other.
    kv.zadd(key, now).await?;
    let count = kv.zcard(key).await?;
    kv.expire(key, window.seconds as i64).await?;

    if count > window.max_requests as i64 {
        let oldest = kv.zmin_score(key).await?.unwrap_or(now);
        let retry_after = ((oldest + window.seconds as f64) - now).ceil().max(1.0) as u64;
        return Ok(Some(retry_after));
    }
    Ok(None)
}

/// Enforce every window of `windows` against `principal:endpoint`, in order,
/// short-circuiting on the first denial. Windows use independent keys so
/// they never interfere with one another.
pub async fn enforce(
    kv: &dyn KvStore,
    principal: &str,
    endpoint: &str,
    windows: &[Window],
) -> Result<()> {
    for window in windows {
        let key = format!("rl:{principal}:{endpoint}:{}", window.seconds);
        if let Some(retry_after) = check_window(kv, &key, *window).await? {
            return Err(ApiError::RateLimited { retry_after });
        }
    }
    Ok(())
}

/// Enforce the per-IP registration window, keyed by client IP.
pub async fn enforce_register(kv: &dyn KvStore, ip: &str) -> Result<()> {
    enforce(kv, &format!("ip:{ip}"), "agents:register", REGISTER_IP_WINDOWS).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKv;

    #[tokio::test]
    async fn allows_up_to_max_then_denies() {
        let kv = InMemoryKv::new();
        let windows = &[w(2, 60)];

        assert!(enforce(&kv, "agent-1", "memory:write", windows).await.is_ok());
        assert!(enforce(&kv, "agent-1", "memory:write", windows).await.is_ok());

        let err = enforce(&kv, "agent-1", "memory:write", windows)
            .await
            .unwrap_err();
        match err {
            ApiError::RateLimited { retry_after } => assert!(retry_after > 0 && retry_after <= 60),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn independent_principals_do_not_share_budget() {
        let kv = InMemoryKv::new();
        let windows = &[w(1, 60)];

        assert!(enforce(&kv, "agent-1", "memory:write", windows).await.is_ok());
        assert!(enforce(&kv, "agent-2", "memory:write", windows).await.is_ok());
    }

    #[tokio::test]
    async fn multi_window_short_circuits_on_first_offending_window() {
        let kv = InMemoryKv::new();
        // trust 0 write rule: 1/60s AND 2/86400s
        let windows = windows_for("memory:write", TrustLevel::UNVERIFIED);

        assert!(enforce(&kv, "agent-1", "memory:write", windows).await.is_ok());
        let err = enforce(&kv, "agent-1", "memory:write", windows)
            .await
            .unwrap_err();
        match err {
            ApiError::RateLimited { retry_after } => assert!(retry_after <= 60),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_endpoint_falls_back_to_default_window() {
        let windows = windows_for("unknown:endpoint", TrustLevel::CORE);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].max_requests, 10);
        assert_eq!(windows[0].seconds, 60);
    }
}
