//! Authentication gate.
//!
//! Bearer token `recall_` + 64 hex chars. Hashed with a one-way digest
//! (SHA-256) and compared against `api_key_hash` via an indexed lookup.
//! Missing/malformed header or unknown hash -> 401; disabled agent -> 403.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use rand::RngCore;
use sha2::{Digest, Sha256};

use recall_types::Agent;

use crate::error::{ApiError, Result};
use crate::state::AppState;

pub const API_KEY_PREFIX: &str = "recall_";
const API_KEY_HEX_LEN: usize = 64;

/// The authenticated principal, attached to request extensions by
/// [`auth_middleware`] and pulled out with an `Extension<AuthIdentity>` extractor.
#[derive(Debug, Clone)]
pub struct AuthIdentity(pub Agent);

/// One-way digest of a bearer secret; never the secret itself.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a fresh bearer secret: `recall_` + 64 hex chars (32 random
/// bytes) from a CSPRNG.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{API_KEY_PREFIX}{hex}")
}

/// `true` if `key` has the shape `recall_` + 64 lowercase-or-uppercase hex chars.
pub fn is_well_formed_key(key: &str) -> bool {
    key.strip_prefix(API_KEY_PREFIX)
        .map(|suffix| suffix.len() == API_KEY_HEX_LEN && suffix.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

fn bearer_token(req: &Request) -> Result<&str> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;
    let value = header
        .to_str()
        .map_err(|_| ApiError::Unauthorized("malformed Authorization header".into()))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("expected a Bearer token".into()))
}

/// Resolve the bearer token to an agent record and reject disabled agents.
/// On success, attaches [`AuthIdentity`] to the request extensions for
/// downstream handlers and the rate limiter.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(&req)?;
    if !is_well_formed_key(token) {
        return Err(ApiError::Unauthorized("malformed api key".into()));
    }

    let hash = hash_api_key(token);
    let agent = state
        .store
        .find_agent_by_key_hash(&hash)?
        .ok_or_else(|| ApiError::Unauthorized("unknown api key".into()))?;

    if agent.is_disabled() {
        return Err(ApiError::Forbidden("agent is disabled".into()));
    }

    req.extensions_mut().insert(AuthIdentity(agent));
    Ok(next.run(req).await)
}
