//! The embedding adapter: `embed(text) -> vector[D]`.
//!
//! # Implementations
//!
//! - [`TestStubEmbedder`]: deterministic, hash-derived vectors. Used in tests
//!   and as the default when no real provider is configured, so that writing
//!   near-identical content to two memories produces near-identical vectors
//!   (needed for duplicate-detection tests to be deterministic).
//! - [`local::LocalEmbedder`]: ONNX Runtime inference, offline (requires the
//!   `local-embeddings` feature).
//! - [`OpenAiEmbedder`]: calls the OpenAI embeddings HTTP API.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Maps text to a dense vector representation for similarity search.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text. Single blocking round trip,
    /// retried zero times — callers see failures directly.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality of vectors this embedder produces.
    fn dimensions(&self) -> usize;

    /// Provenance string stored on `Memory::embedding_model`.
    fn name(&self) -> &str;
}

/// A shared embedder usable across request tasks.
pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// Test-stub embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministic embedder for tests: the same text always yields the same
/// unit-length vector, and near-identical texts yield near-identical vectors
/// because the hash state walk only depends on shared byte prefixes diverging
/// late — enough to drive the duplicate-detection scenarios without a live
/// provider.
#[derive(Debug, Clone)]
pub struct TestStubEmbedder {
    dimensions: usize,
}

impl TestStubEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for TestStubEmbedder {
    fn default() -> Self {
        Self::new(32)
    }
}

#[async_trait]
impl Embedder for TestStubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = simple_hash(text);
        let mut embedding = vec![0.0f32; self.dimensions];

        let mut state = hash;
        for slot in &mut embedding {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            *slot = ((state >> 16) as f32 / 32768.0) - 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "test-stub"
    }
}

/// Returns the same fixed vector for every input, regardless of text.
///
/// Used in duplicate-detection tests: two writes through this embedder are
/// guaranteed to probe as near-identical.
#[derive(Debug, Clone)]
pub struct FixedVectorEmbedder {
    vector: Vec<f32>,
}

impl FixedVectorEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl Embedder for FixedVectorEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }

    fn name(&self) -> &str {
        "test-stub-fixed"
    }
}

fn simple_hash(s: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    hash
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Embedder
// ─────────────────────────────────────────────────────────────────────────────

use reqwest::Client;
use std::time::Duration;

/// Configuration for the OpenAI embeddings HTTP API.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiEmbedderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// OpenAI embeddings API client.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbedderConfig,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(crate::error::EmbeddingError::Request)?;

        let dimensions = match config.model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536,
        };

        Ok(Self {
            client,
            config,
            dimensions,
        })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.config.base_url)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: self.config.model.clone(),
            input: vec![text.to_string()],
        };

        let response = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(crate::error::EmbeddingError::Provider(format!(
                "HTTP {status} - {body}"
            )));
        }

        let mut result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| crate::error::EmbeddingError::Serialization(e.to_string()))?;

        result.data.sort_by_key(|e| e.index);
        result
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| crate::error::EmbeddingError::Provider("no embedding returned".into()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, serde::Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Local Embedder (ONNX Runtime)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "local-embeddings")]
pub mod local {
    //! Local embeddings using ONNX Runtime. Requires the `local-embeddings`
    //! feature.

    use super::*;
    use ndarray::Array2;
    use ort::{GraphOptimizationLevel, Session};
    use std::path::Path;
    use tokenizers::Tokenizer;

    /// Local embedder: mean-pools the last hidden state of a sentence-encoder
    /// ONNX model over the attention mask, then L2-normalizes.
    pub struct LocalEmbedder {
        session: Session,
        tokenizer: Tokenizer,
        dimensions: usize,
    }

    impl LocalEmbedder {
        pub fn load(
            model_path: impl AsRef<Path>,
            tokenizer_path: impl AsRef<Path>,
            dimensions: usize,
        ) -> Result<Self> {
            let session = Session::builder()
                .map_err(|e| crate::error::EmbeddingError::Local(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| crate::error::EmbeddingError::Local(e.to_string()))?
                .commit_from_file(model_path.as_ref())
                .map_err(|e| crate::error::EmbeddingError::Local(e.to_string()))?;

            let tokenizer = Tokenizer::from_file(tokenizer_path.as_ref())
                .map_err(|e| crate::error::EmbeddingError::Local(e.to_string()))?;

            Ok(Self {
                session,
                tokenizer,
                dimensions,
            })
        }

        fn run_one(&self, text: &str) -> Result<Vec<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| crate::error::EmbeddingError::Local(e.to_string()))?;

            let ids: Vec<i64> = encoding.get_ids().iter().map(|&v| v as i64).collect();
            let mask: Vec<i64> = encoding.get_attention_mask().iter().map(|&v| v as i64).collect();
            let types: Vec<i64> = encoding.get_type_ids().iter().map(|&v| v as i64).collect();
            let seq_len = ids.len();

            let input_ids = Array2::from_shape_vec((1, seq_len), ids)
                .map_err(|e| crate::error::EmbeddingError::Local(e.to_string()))?;
            let attention_mask = Array2::from_shape_vec((1, seq_len), mask.clone())
                .map_err(|e| crate::error::EmbeddingError::Local(e.to_string()))?;
            let token_type_ids = Array2::from_shape_vec((1, seq_len), types)
                .map_err(|e| crate::error::EmbeddingError::Local(e.to_string()))?;

            let outputs = self
                .session
                .run(ort::inputs![
                    "input_ids" => input_ids.view(),
                    "attention_mask" => attention_mask.view(),
                    "token_type_ids" => token_type_ids.view(),
                ]
                .map_err(|e| crate::error::EmbeddingError::Local(e.to_string()))?)
                .map_err(|e| crate::error::EmbeddingError::Local(e.to_string()))?;

            let hidden = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| crate::error::EmbeddingError::Local(e.to_string()))?
                .view()
                .to_owned();
            let shape = hidden.shape();
            let hidden_dim = shape[2];

            let mut sum = vec![0.0f32; hidden_dim];
            let mut count = 0.0f32;
            for (j, &mask_val) in mask.iter().enumerate() {
                if mask_val > 0 {
                    let row = hidden.slice(ndarray::s![0, j, ..]);
                    for (k, &v) in row.iter().enumerate() {
                        sum[k] += v;
                    }
                    count += 1.0;
                }
            }
            if count > 0.0 {
                for v in &mut sum {
                    *v /= count;
                }
            }
            let norm: f32 = sum.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 1e-9 {
                for v in &mut sum {
                    *v /= norm;
                }
            }
            Ok(sum)
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.run_one(text)
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn name(&self) -> &str {
            "local"
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Provider-agnostic spec a binary populates from `recall_config::Settings`.
#[derive(Debug, Clone)]
pub struct EmbedderSpec {
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub local_model_path: Option<std::path::PathBuf>,
    pub local_tokenizer_path: Option<std::path::PathBuf>,
    pub dimensions: usize,
}

/// Build a `SharedEmbedder` from a spec. No silent fallback to a different
/// provider: a misconfigured deployment should fail loudly at startup rather
/// than quietly serve mock vectors.
pub fn build_embedder(spec: &EmbedderSpec) -> Result<SharedEmbedder> {
    match spec.provider.as_str() {
        "openai" => {
            let api_key = spec.openai_api_key.as_deref().ok_or_else(|| {
                crate::error::EmbeddingError::Config(
                    "OpenAI embedding provider requires OPENAI_API_KEY".to_string(),
                )
            })?;
            let mut config = OpenAiEmbedderConfig::new(api_key);
            if let Some(ref model) = spec.openai_model {
                config = config.with_model(model);
            }
            Ok(Arc::new(OpenAiEmbedder::new(config)?))
        }
        #[cfg(feature = "local-embeddings")]
        "local" => {
            let (Some(model_path), Some(tokenizer_path)) =
                (&spec.local_model_path, &spec.local_tokenizer_path)
            else {
                return Err(crate::error::EmbeddingError::Config(
                    "local embedding provider requires LOCAL_EMBEDDING_MODEL_PATH and \
                     LOCAL_EMBEDDING_TOKENIZER_PATH"
                        .to_string(),
                ));
            };
            let embedder = local::LocalEmbedder::load(model_path, tokenizer_path, spec.dimensions)?;
            Ok(Arc::new(embedder))
        }
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(crate::error::EmbeddingError::Config(
            "local embedding provider requested but the 'local-embeddings' feature is disabled"
                .to_string(),
        )),
        "test-stub" | "mock" => Ok(Arc::new(TestStubEmbedder::new(spec.dimensions))),
        other => Err(crate::error::EmbeddingError::Config(format!(
            "unknown embedding provider '{other}'. Valid: openai, local, test-stub"
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Utility Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Cosine similarity in `[-1, 1]`; `0.0` if either vector is zero-length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_embedder_is_deterministic() {
        let embedder = TestStubEmbedder::new(32);
        let e1 = embedder.embed("hello world").await.unwrap();
        let e2 = embedder.embed("hello world").await.unwrap();
        assert_eq!(e1, e2);
        assert_eq!(e1.len(), 32);
    }

    #[tokio::test]
    async fn test_stub_embedder_differs_across_texts() {
        let embedder = TestStubEmbedder::new(32);
        let e1 = embedder.embed("hello").await.unwrap();
        let e2 = embedder.embed("world").await.unwrap();
        assert_ne!(e1, e2);
    }

    #[tokio::test]
    async fn test_stub_embedder_is_unit_length() {
        let embedder = TestStubEmbedder::new(16);
        let v = embedder.embed("anything").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn fixed_vector_embedder_ignores_input() {
        let embedder = FixedVectorEmbedder::new(vec![1.0, 0.0, 0.0]);
        let a = embedder.embed("memory A content").await.unwrap();
        let b = embedder.embed("totally different memory B").await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.001);
    }

    #[test]
    fn build_embedder_rejects_unknown_provider() {
        let spec = EmbedderSpec {
            provider: "carrier-pigeon".to_string(),
            openai_api_key: None,
            openai_model: None,
            local_model_path: None,
            local_tokenizer_path: None,
            dimensions: 32,
        };
        assert!(build_embedder(&spec).is_err());
    }

    #[test]
    fn build_embedder_openai_requires_api_key() {
        let spec = EmbedderSpec {
            provider: "openai".to_string(),
            openai_api_key: None,
            openai_model: None,
            local_model_path: None,
            local_tokenizer_path: None,
            dimensions: 1536,
        };
        assert!(build_embedder(&spec).is_err());
    }

    #[test]
    fn build_embedder_test_stub_succeeds() {
        let spec = EmbedderSpec {
            provider: "test-stub".to_string(),
            openai_api_key: None,
            openai_model: None,
            local_model_path: None,
            local_tokenizer_path: None,
            dimensions: 32,
        };
        let embedder = build_embedder(&spec).unwrap();
        assert_eq!(embedder.dimensions(), 32);
    }
}
