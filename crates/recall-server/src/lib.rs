//! HTTP API for Recall: a multi-agent shared-memory service.
//!
//! This crate provides the network transport layer: request routing,
//! bearer-token authentication, the sliding-window rate limiter, and the
//! short-TTL search cache, wired around the storage and embedding crates.
//!
//! # Example
//!
//! ```ignore
//! use recall_server::{AppState, Server};
//!
//! let state = AppState::new(store, embedder, kv, settings);
//! let server = Server::from_state(state);
//! server.run_on("0.0.0.0:8080".parse()?).await?;
//! ```

pub mod auth;
pub mod cache;
pub mod error;
pub mod kv;
pub mod ratelimit;
pub mod routes;
pub mod state;

pub use auth::{auth_middleware, AuthIdentity};
pub use error::{ApiError, Result};
pub use kv::KvStore;
pub use state::AppState;

use std::net::SocketAddr;

use axum::{middleware, routing::get, routing::post, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Recall HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(routes::health_handler))
            .route("/api/v1/agents/register", post(routes::register_handler))
            .merge(self.authenticated_routes())
            .merge(routes::openapi::swagger_ui())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Routes reachable only with a valid bearer token.
    fn authenticated_routes(&self) -> Router<AppState> {
        Router::new()
            .route("/api/v1/memory", post(routes::write_handler))
            .route("/api/v1/memory/search", get(routes::search_handler))
            .route("/api/v1/memory/{handle}", get(routes::get_handler))
            .route("/api/v1/admin/heartbeat", post(routes::heartbeat_handler))
            .route(
                "/api/v1/admin/quarantine/{agent_id}",
                post(routes::quarantine_handler),
            )
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::auth_middleware,
            ))
    }

    /// Run the server on its configured bind address.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        info!(%addr, "starting recall server");

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to bind {addr}: {e}")))?;

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| ApiError::Internal(format!("server error: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint_requires_no_auth() {
        let state = AppState::for_tests();
        let server = Server::from_state(state);
        let app = server.router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn memory_write_without_bearer_token_is_unauthorized() {
        let state = AppState::for_tests();
        let server = Server::from_state(state);
        let app = server.router();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/memory")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"content":"x","tags":["a","b"]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
