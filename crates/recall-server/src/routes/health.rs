//! Liveness probe: no auth, no rate limiting.

use axum::extract::State;
use axum::Json;

use recall_types::api::HealthResponse;

use crate::state::AppState;

const PROTOCOL_VERSION: &str = "1.0.0";

/// GET /health - liveness + dependency probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is reachable", body = HealthResponse),
    ),
    tag = "health"
)]
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = if state.store.embedding_dims() > 0 {
        "ok"
    } else {
        "unknown"
    };
    let cache = match state.kv.get("health:probe").await {
        Ok(_) => "ok",
        Err(_) => "unreachable",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        db: db.to_string(),
        cache: cache.to_string(),
    })
}
