//! Application state shared across all handlers.

use std::sync::Arc;

use recall_config::Settings;
use recall_embeddings::SharedEmbedder;
use recall_storage::Store;

use crate::kv::KvStore;

/// Everything a handler needs: the storage layer, the embedding adapter,
/// the shared key-value client backing the rate limiter and search cache,
/// and resolved deployment settings.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub embedder: SharedEmbedder,
    pub kv: Arc<dyn KvStore>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        embedder: SharedEmbedder,
        kv: Arc<dyn KvStore>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            store,
            embedder,
            kv,
            settings,
        }
    }

    /// Build state for tests: in-memory store, deterministic embedder, and
    /// an in-process fake key-value client — the full request path runs with
    /// no external services.
    pub fn for_tests() -> Self {
        let settings = Arc::new(Settings::for_tests());
        let store = Arc::new(Store::open_in_memory(settings.embedding_dim).expect("open store"));
        let embedder: SharedEmbedder = Arc::new(recall_embeddings::TestStubEmbedder::new(
            settings.embedding_dim,
        ));
        let kv: Arc<dyn KvStore> = Arc::new(crate::kv::InMemoryKv::new());
        Self::new(store, embedder, kv, settings)
    }
}
