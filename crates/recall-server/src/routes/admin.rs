//! Admin operations: heartbeat and per-agent quarantine, both
//! restricted to `trust_level >= 2`.

use axum::extract::{Extension, Path, State};
use axum::Json;
use uuid::Uuid;

use recall_types::api::{HeartbeatResponse, QuarantineResponse};

use crate::auth::AuthIdentity;
use crate::error::{ApiError, Result};
use crate::state::AppState;

fn require_admin(agent: &recall_types::Agent) -> Result<()> {
    if agent.trust_level.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin operations require trust_level >= 2".into()))
    }
}

/// POST /api/v1/admin/heartbeat - liveness ping that re-enables writes.
#[utoipa::path(
    post,
    path = "/api/v1/admin/heartbeat",
    responses(
        (status = 200, description = "Heartbeat recorded", body = HeartbeatResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Caller is not an admin (trust_level < 2)"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn heartbeat_handler(
    State(state): State<AppState>,
    Extension(AuthIdentity(agent)): Extension<AuthIdentity>,
) -> Result<Json<HeartbeatResponse>> {
    require_admin(&agent)?;

    let heartbeat = state.store.admin_heartbeat()?;

    Ok(Json(HeartbeatResponse {
        success: true,
        heartbeat: heartbeat.to_rfc3339(),
        global_write_enabled: true,
    }))
}

/// POST /api/v1/admin/quarantine/{agent_id} - disable an agent and quarantine its memories.
#[utoipa::path(
    post,
    path = "/api/v1/admin/quarantine/{agent_id}",
    params(
        ("agent_id" = String, Path, description = "Target agent's UUID"),
    ),
    responses(
        (status = 200, description = "Agent quarantined", body = QuarantineResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Caller is not an admin (trust_level < 2)"),
        (status = 404, description = "Agent not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn quarantine_handler(
    State(state): State<AppState>,
    Extension(AuthIdentity(agent)): Extension<AuthIdentity>,
    Path(agent_id): Path<String>,
) -> Result<Json<QuarantineResponse>> {
    require_admin(&agent)?;

    let target = Uuid::parse_str(&agent_id)
        .map_err(|_| ApiError::Validation(vec!["agent_id".to_string()]))?;
    state.store.quarantine_agent(target)?;

    Ok(Json(QuarantineResponse {
        success: true,
        agent_id: target.to_string(),
        status: "quarantined".to_string(),
    }))
}
