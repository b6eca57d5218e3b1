//! Embedding adapter: text -> fixed-length dense vector via a pluggable
//! provider (OpenAI, local ONNX, or a deterministic test stub).

pub mod embedder;
pub mod error;

pub use embedder::{
    build_embedder, cosine_similarity, Embedder, EmbedderSpec, FixedVectorEmbedder,
    OpenAiEmbedder, OpenAiEmbedderConfig, SharedEmbedder, TestStubEmbedder,
};
pub use error::{EmbeddingError, Result};

#[cfg(feature = "local-embeddings")]
pub use embedder::local::LocalEmbedder;
