//! The write pipeline with online near-duplicate detection, the cached
//! semantic-search pipeline, and single-memory lookup.

use axum::extract::{Extension, Path, Query, State};
use axum::Json;

use recall_types::{api, Memory, RelationKind, TrustLevel};
use recall_storage::validation;

use crate::auth::AuthIdentity;
use crate::cache::{self, CachedRow};
use crate::error::{ApiError, Result};
use crate::ratelimit;
use crate::state::AppState;

/// Initial quality: unverified authors start below the neutral line.
fn initial_quality(trust: TrustLevel) -> i32 {
    if trust == TrustLevel::UNVERIFIED {
        Memory::PROVISIONAL
    } else {
        Memory::NEUTRAL
    }
}

/// POST /api/v1/memory - write a memory, probing the corpus for near-duplicates.
#[utoipa::path(
    post,
    path = "/api/v1/memory",
    request_body = api::MemoryWriteRequest,
    responses(
        (status = 200, description = "Memory stored (or flagged as a duplicate)", body = api::MemoryWriteResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 422, description = "Validation failed"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 503, description = "Writes are globally disabled"),
    ),
    security(("bearer_auth" = [])),
    tag = "memory"
)]
pub async fn write_handler(
    State(state): State<AppState>,
    Extension(AuthIdentity(agent)): Extension<AuthIdentity>,
    Json(body): Json<api::MemoryWriteRequest>,
) -> Result<Json<api::MemoryWriteResponse>> {
    let windows = ratelimit::windows_for("memory:write", agent.trust_level);
    ratelimit::enforce(state.kv.as_ref(), &agent.id.to_string(), "memory:write", windows).await?;

    if !state.store.is_write_enabled()? {
        return Err(ApiError::WriteDisabled);
    }

    let fields = validation::validate_write(&body.content, &body.tags, state.settings.min_content_length);
    if !fields.is_empty() {
        return Err(ApiError::Validation(fields));
    }

    let embedding = state.embedder.embed(&body.content).await?;
    let quality = initial_quality(agent.trust_level);

    let outcome = state.store.insert_memory_and_probe(
        agent.id,
        &body.content,
        &body.tags,
        body.source_url.as_deref(),
        &embedding,
        state.embedder.name(),
        quality,
        state.settings.min_similarity,
        state.settings.duplicate_threshold,
        state.settings.auto_duplicate_threshold,
    )?;

    let status = if outcome.memory.duplicate_of.is_some() {
        "duplicate"
    } else {
        "saved"
    };

    let similar = outcome
        .similar
        .into_iter()
        .map(|entry| api::SimilarMemory {
            id: entry.id.to_string(),
            short_id: entry.short_id.to_string(),
            similarity: entry.similarity,
            relation: entry.relation.to_string(),
        })
        .collect();

    Ok(Json(api::MemoryWriteResponse {
        success: true,
        id: outcome.memory.id.to_string(),
        short_id: outcome.memory.short_id.to_string(),
        status: status.to_string(),
        similar,
    }))
}

/// GET /api/v1/memory/search - cached semantic search over the corpus.
#[utoipa::path(
    get,
    path = "/api/v1/memory/search",
    params(
        ("q" = String, Query, description = "Free-text query, embedded for similarity search"),
        ("limit" = Option<u32>, Query, description = "Max results, default 10"),
    ),
    responses(
        (status = 200, description = "Matching memories", body = api::MemorySearchResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 422, description = "Validation failed"),
        (status = 429, description = "Rate limit exceeded"),
    ),
    security(("bearer_auth" = [])),
    tag = "memory"
)]
pub async fn search_handler(
    State(state): State<AppState>,
    Extension(AuthIdentity(agent)): Extension<AuthIdentity>,
    Query(query): Query<api::MemorySearchQuery>,
) -> Result<Json<api::MemorySearchResponse>> {
    let windows = ratelimit::windows_for("memory:search", agent.trust_level);
    ratelimit::enforce(state.kv.as_ref(), &agent.id.to_string(), "memory:search", windows).await?;

    let limit = query.limit.unwrap_or(10) as usize;
    let fields = validation::validate_search(&query.q, limit);
    if !fields.is_empty() {
        return Err(ApiError::Validation(fields));
    }

    let rows = match cache::get(state.kv.as_ref(), &query.q, limit).await? {
        Some(cached) => cached,
        None => {
            let embedding = state.embedder.embed(&query.q).await?;
            let hits = state
                .store
                .vector_search(&embedding, limit, state.settings.min_similarity)?;
            let cached: Vec<CachedRow> = hits
                .into_iter()
                .map(|row| CachedRow {
                    id: row.memory.id.to_string(),
                    short_id: row.memory.short_id.to_string(),
                    agent_id: row.memory.agent_id.to_string(),
                    author_name: row.author_name,
                    content: row.memory.content,
                    tags: row.memory.tags,
                    source_url: row.memory.source_url,
                    created_at: row.memory.created_at.to_rfc3339(),
                    similarity: row.similarity,
                    retrieval_count: row.retrieval_count,
                })
                .collect();
            cache::put(state.kv.as_ref(), &query.q, limit, &cached).await?;
            cached
        }
    };

    for row in &rows {
        if let Ok(memory_id) = row.id.parse() {
            let _ = state
                .store
                .log_retrieval(agent.id, memory_id, &query.q, row.similarity);
        }
    }

    let results = rows
        .into_iter()
        .map(|row| api::MemorySearchResult {
            id: row.id,
            short_id: row.short_id,
            content: row.content,
            tags: row.tags,
            source_url: row.source_url,
            author: api::AuthorInfo { name: row.author_name },
            created_at: row.created_at,
            similarity: row.similarity,
            retrieval_count: row.retrieval_count,
        })
        .collect();

    Ok(Json(api::MemorySearchResponse {
        success: true,
        query: query.q,
        results,
    }))
}

/// GET /api/v1/memory/{handle} - fetch one memory by id or short id.
#[utoipa::path(
    get,
    path = "/api/v1/memory/{handle}",
    params(
        ("handle" = String, Path, description = "Memory UUID or RCL-xxxxxxxx short id"),
    ),
    responses(
        (status = 200, description = "Memory detail with related links", body = api::MemoryGetResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No memory matches the handle"),
        (status = 429, description = "Rate limit exceeded"),
    ),
    security(("bearer_auth" = [])),
    tag = "memory"
)]
pub async fn get_handler(
    State(state): State<AppState>,
    Extension(AuthIdentity(agent)): Extension<AuthIdentity>,
    Path(handle): Path<String>,
) -> Result<Json<api::MemoryGetResponse>> {
    let windows = ratelimit::windows_for("memory:get", agent.trust_level);
    ratelimit::enforce(state.kv.as_ref(), &agent.id.to_string(), "memory:get", windows).await?;

    let detail = state
        .store
        .get_memory_by_id_or_short(&handle)?
        .ok_or_else(|| ApiError::NotFound(format!("no memory matching '{handle}'")))?;

    let related = detail
        .related
        .into_iter()
        .map(|r| api::RelatedMemory {
            id: r.id.to_string(),
            short_id: r.short_id.to_string(),
            relation: relation_label(r.relation),
            similarity: r.similarity,
        })
        .collect();

    Ok(Json(api::MemoryGetResponse {
        success: true,
        memory: api::MemoryDetail {
            id: detail.memory.id.to_string(),
            short_id: detail.memory.short_id.to_string(),
            content: detail.memory.content,
            tags: detail.memory.tags,
            source_url: detail.memory.source_url,
            author: api::AuthorInfo { name: detail.author_name },
            created_at: detail.memory.created_at.to_rfc3339(),
            related,
        },
    }))
}

fn relation_label(relation: RelationKind) -> String {
    relation.to_string()
}
