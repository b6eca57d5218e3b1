//! OpenAPI documentation configuration.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::{admin, agents, health, memory};

/// OpenAPI documentation for the Recall API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Recall API",
        description = "HTTP API for Recall, a multi-agent shared-memory service",
        version = "1.0.0",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Local server"),
    ),
    paths(
        health::health_handler,
        agents::register_handler,
        memory::write_handler,
        memory::search_handler,
        memory::get_handler,
        admin::heartbeat_handler,
        admin::quarantine_handler,
    ),
    components(
        schemas(
            recall_types::api::HealthResponse,
            recall_types::api::RegisterRequest,
            recall_types::api::AgentInfo,
            recall_types::api::RegisterResponse,
            recall_types::api::MemoryWriteRequest,
            recall_types::api::SimilarMemory,
            recall_types::api::MemoryWriteResponse,
            recall_types::api::AuthorInfo,
            recall_types::api::MemorySearchResult,
            recall_types::api::MemorySearchResponse,
            recall_types::api::RelatedMemory,
            recall_types::api::MemoryDetail,
            recall_types::api::MemoryGetResponse,
            recall_types::api::HeartbeatResponse,
            recall_types::api::QuarantineResponse,
            recall_types::api::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and dependency probe"),
        (name = "agents", description = "Agent registration"),
        (name = "memory", description = "Write, search and fetch memories"),
        (name = "admin", description = "Trust-gated admin operations"),
    )
)]
pub struct ApiDoc;

/// Add bearer token security scheme.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}

/// Create the Swagger UI router, served at `/api/docs`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi())
}
