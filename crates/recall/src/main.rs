//! Recall - multi-agent shared-memory service.
//!
//! Loads deployment settings from the environment, wires up storage, the
//! embedding adapter and the key-value client, and serves the HTTP API.

use std::sync::Arc;

use anyhow::{Context, Result};

use recall_config::{EmbeddingProvider, Settings};
use recall_embeddings::{EmbedderSpec, SharedEmbedder};
use recall_server::{AppState, Server};
use recall_storage::Store;

/// Translate resolved deployment settings into the provider-agnostic spec
/// `recall_embeddings::build_embedder` expects.
fn build_embedder(settings: &Settings) -> Result<SharedEmbedder> {
    let provider = match settings.embedding_provider {
        EmbeddingProvider::OpenAi => "openai",
        EmbeddingProvider::Local => "local",
        EmbeddingProvider::TestStub => "test-stub",
    };

    let spec = EmbedderSpec {
        provider: provider.to_string(),
        openai_api_key: settings.openai_api_key.clone(),
        openai_model: Some(settings.embedding_model.clone()),
        local_model_path: settings.local_model_path.clone(),
        local_tokenizer_path: settings.local_tokenizer_path.clone(),
        dimensions: settings.embedding_dim,
    };

    recall_embeddings::build_embedder(&spec)
        .context("failed to build embedding adapter from deployment settings")
}

fn init_tracing() {
    use tracing_subscriber::prelude::*;

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "recall=info,recall_server=info,recall_storage=info,warn".to_string());

    let log_dir = std::env::var("RECALL_LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    let file_appender = tracing_appender::rolling::daily(&log_dir, "recall.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Leaked deliberately: the guard must outlive the process, and this runs once at startup.
    Box::leak(Box::new(guard));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter.clone())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = Settings::from_env().context("failed to load settings")?;
    let settings = Arc::new(settings);

    let store = Arc::new(
        Store::open(&settings.database_path, settings.embedding_dim)
            .context("failed to open storage")?,
    );
    let embedder = build_embedder(&settings)?;
    let kv: Arc<dyn recall_server::KvStore> = Arc::new(recall_server::kv::RedisKv::new(settings.redis_url.clone()));

    let state = AppState::new(store, embedder, kv, settings.clone());
    let server = Server::from_state(state);

    let addr = settings
        .bind_addr
        .parse()
        .context("invalid BIND_ADDR")?;
    server.run(addr).await.map_err(|e| anyhow::anyhow!(e))
}
