//! End-to-end HTTP scenarios driven against the full router: auth,
//! rate limiting, the write pipeline with dedup, search, and admin
//! quarantine, all wired together exactly as the running service serves
//! them. No network socket is bound — requests go through the router via
//! `tower::ServiceExt::oneshot`, but every middleware layer and handler
//! runs for real.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use recall_embeddings::FixedVectorEmbedder;
use recall_server::{AppState, Server};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register(app: &axum::Router, name: &str) -> (String, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/agents/register")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "name": name }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    (
        body["agent"]["id"].as_str().unwrap().to_string(),
        body["api_key"].as_str().unwrap().to_string(),
    )
}

async fn write_memory(
    app: &axum::Router,
    api_key: &str,
    content: &str,
    tags: &[&str],
) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/memory")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {api_key}"))
                .body(Body::from(json!({ "content": content, "tags": tags }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn register_write_and_search() {
    let state = AppState::for_tests();
    let app = Server::from_state(state).router();

    let (_id, api_key) = register(&app, "Alice").await;

    let content = "x".repeat(100);
    let response = write_memory(&app, &api_key, &content, &["test", "unit"]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["short_id"].as_str().unwrap().starts_with("RCL-"));
    assert_eq!(body["similar"].as_array().unwrap().len(), 0);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/memory/search?q=anything")
                .header("authorization", format!("Bearer {api_key}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["results"].is_array());
}

#[tokio::test]
async fn validation_failures_are_422() {
    // Two distinct agents: trust 0 write is rate-limited to 1/60s, and the
    // rate-limit precondition runs ahead of validation, so a second write
    // from the same agent would trip 429 before it ever reached the
    // validator.
    let state = AppState::for_tests();
    let app = Server::from_state(state).router();
    let (_id, api_key) = register(&app, "Bob").await;
    let (_id2, api_key2) = register(&app, "Bobby").await;

    let response = write_memory(&app, &api_key, "short", &["a", "b"]).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let long = "x".repeat(100);
    let response = write_memory(&app, &api_key2, &long, &["only-one"]).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/agents/register")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "name": "" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unauthenticated_write_is_401() {
    let state = AppState::for_tests();
    let app = Server::from_state(state).router();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/memory")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "content": "x".repeat(100), "tags": ["a", "b"] }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn get_unknown_handle_is_404() {
    let state = AppState::for_tests();
    let app = Server::from_state(state).router();
    let (_id, api_key) = register(&app, "Carol").await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/memory/RCL-ZZZZZZZZ")
                .header("authorization", format!("Bearer {api_key}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn near_identical_writes_are_flagged_as_duplicates() {
    // A fixed-vector embedder drives duplicate detection deterministically:
    // every input maps to the same vector, so the second write is
    // guaranteed to probe as near-identical to the first.
    let mut state = AppState::for_tests();
    let fixed: recall_embeddings::SharedEmbedder =
        std::sync::Arc::new(FixedVectorEmbedder::new(vec![1.0; state.settings.embedding_dim]));
    state.embedder = fixed;
    let app = Server::from_state(state).router();

    // Two distinct agents: trust 0 write is capped at 1/60s, and duplicate
    // detection probes across the whole corpus regardless of author.
    let (_id, api_key) = register(&app, "Dana").await;
    let (_id2, api_key2) = register(&app, "Dana2").await;

    let a = write_memory(&app, &api_key, &"a".repeat(100), &["x", "y"]).await;
    assert_eq!(a.status(), StatusCode::OK);
    let a_body = body_json(a).await;
    let a_id = a_body["id"].as_str().unwrap().to_string();

    let b = write_memory(&app, &api_key2, &"b".repeat(100), &["x", "y"]).await;
    assert_eq!(b.status(), StatusCode::OK);
    let b_body = body_json(b).await;

    let similar = b_body["similar"].as_array().unwrap();
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0]["id"].as_str().unwrap(), a_id);
    assert_eq!(similar[0]["relation"], "duplicate_candidate");
    assert!(similar[0]["similarity"].as_f64().unwrap() >= 0.97);
    assert_eq!(b_body["status"], "duplicate");
}

#[tokio::test]
async fn trust_zero_writes_are_rate_limited_to_one_per_minute() {
    // Rule table: trust 0 `memory:write` is `1/60s AND 2/86400s` — the
    // tighter per-minute window trips on the very next write.
    let state = AppState::for_tests();
    let app = Server::from_state(state).router();
    let (_id, api_key) = register(&app, "Eve").await;

    let first = write_memory(&app, &api_key, &"a".repeat(100), &["x", "y"]).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = write_memory(&app, &api_key, &"b".repeat(100), &["x", "y"]).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn quarantine_disables_agent_and_hides_memories_from_search() {
    let state = AppState::for_tests();
    let store = state.store.clone();
    let app = Server::from_state(state).router();

    let (target_id, target_key) = register(&app, "Mallory").await;

    let write = write_memory(&app, &target_key, &"a".repeat(100), &["x", "y"]).await;
    assert_eq!(write.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/memory/search?q=anything")
                .header("authorization", format!("Bearer {target_key}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let quarantine = store.quarantine_agent(
        uuid::Uuid::parse_str(&target_id).unwrap(),
    );
    assert!(quarantine.is_ok());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/memory/search?q=anything")
                .header("authorization", format!("Bearer {target_key}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
