//! Agent registration: the only write-capable endpoint reachable
//! without a bearer token, gated instead by a per-IP rate limit.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;

use recall_types::api::{AgentInfo, RegisterRequest, RegisterResponse};
use recall_storage::validation;

use crate::auth;
use crate::error::{ApiError, Result};
use crate::ratelimit;
use crate::state::AppState;

/// Best-effort client IP: trusts `x-forwarded-for`/`x-real-ip` ahead of the
/// socket address, the way a deployment behind a reverse proxy expects.
fn client_ip(headers: &HeaderMap, connect_info: Option<SocketAddr>) -> String {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = value.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    if let Some(value) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !value.is_empty() {
            return value.to_string();
        }
    }
    connect_info
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

/// POST /api/v1/agents/register - create an agent, issuing a bearer key.
#[utoipa::path(
    post,
    path = "/api/v1/agents/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Agent registered", body = RegisterResponse),
        (status = 422, description = "Validation failed"),
        (status = 429, description = "Per-IP registration limit exceeded"),
        (status = 503, description = "Writes are globally disabled"),
    ),
    tag = "agents"
)]
pub async fn register_handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    let ip = client_ip(&headers, connect_info.map(|c| c.0));
    ratelimit::enforce_register(state.kv.as_ref(), &ip).await?;

    if !state.store.is_write_enabled()? {
        return Err(ApiError::WriteDisabled);
    }

    let fields = validation::validate_register_name(&body.name);
    if !fields.is_empty() {
        return Err(ApiError::Validation(fields));
    }

    let api_key = auth::generate_api_key();
    let key_hash = auth::hash_api_key(&api_key);
    let agent = state.store.create_agent(&body.name, &key_hash)?;

    Ok(Json(RegisterResponse {
        agent: AgentInfo {
            id: agent.id.to_string(),
            name: agent.name,
        },
        api_key,
    }))
}
