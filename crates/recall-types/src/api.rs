//! HTTP request/response DTOs for the `/api/v1` surface.
//!
//! These shapes are intentionally flat and serde-only: validation lives in
//! `recall-storage::validation`, dispatch lives in `recall-server::routes`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ── Agent registration ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub agent: AgentInfo,
    pub api_key: String,
}

// ── Memory write ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MemoryWriteRequest {
    pub content: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SimilarMemory {
    pub id: String,
    pub short_id: String,
    pub similarity: f64,
    pub relation: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemoryWriteResponse {
    pub success: bool,
    pub id: String,
    pub short_id: String,
    pub status: String,
    pub similar: Vec<SimilarMemory>,
}

// ── Memory search ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MemorySearchQuery {
    pub q: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemorySearchResult {
    pub id: String,
    pub short_id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub author: AuthorInfo,
    pub created_at: String,
    pub similarity: f64,
    pub retrieval_count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemorySearchResponse {
    pub success: bool,
    pub query: String,
    pub results: Vec<MemorySearchResult>,
}

// ── Memory get ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RelatedMemory {
    pub id: String,
    pub short_id: String,
    pub relation: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemoryDetail {
    pub id: String,
    pub short_id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub author: AuthorInfo,
    pub created_at: String,
    pub related: Vec<RelatedMemory>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemoryGetResponse {
    pub success: bool,
    pub memory: MemoryDetail,
}

// ── Admin ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HeartbeatResponse {
    pub success: bool,
    pub heartbeat: String,
    pub global_write_enabled: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuarantineResponse {
    pub success: bool,
    pub agent_id: String,
    pub status: String,
}

// ── Health ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub protocol_version: String,
    pub db: String,
    pub cache: String,
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fields: Vec<String>,
}
