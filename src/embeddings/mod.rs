// src/embeddings/mod.rs
// Embedding provider module

mod hash;
mod openai;

pub use self::hash::HashEmbedder;
pub use self::openai::OpenAiEmbedder;

use crate::error::Result;
use tracing::info;

/// Backend-specific embedding implementation
enum EmbeddingBackend {
    OpenAi(OpenAiEmbedder),
    Hash(HashEmbedder),
}

/// Embedding client with automatic provider selection.
///
/// Priority: OpenAI-compatible API (requires `OPENAI_API_KEY`) > local
/// feature hashing (no key, deterministic, offline).
pub struct EmbeddingClient {
    backend: EmbeddingBackend,
}

impl EmbeddingClient {
    /// Select a provider from the environment.
    pub fn from_env(http: reqwest::Client) -> Self {
        if let Some(api_key) = read_key("OPENAI_API_KEY") {
            let base_url = std::env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "https://api.openai.com".to_string());
            let client = OpenAiEmbedder::new(http, base_url, api_key);
            info!(
                model = client.model_name(),
                dimension = client.dimension(),
                "using OpenAI embeddings"
            );
            return Self {
                backend: EmbeddingBackend::OpenAi(client),
            };
        }

        let client = HashEmbedder::default();
        info!(
            model = client.model_name(),
            dimension = client.dimension(),
            "using local hash embeddings"
        );
        Self {
            backend: EmbeddingBackend::Hash(client),
        }
    }

    /// Deterministic local backend, independent of the environment.
    pub fn local() -> Self {
        Self {
            backend: EmbeddingBackend::Hash(HashEmbedder::default()),
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.backend {
            EmbeddingBackend::OpenAi(c) => c.dimension(),
            EmbeddingBackend::Hash(c) => c.dimension(),
        }
    }

    pub fn model_name(&self) -> &str {
        match &self.backend {
            EmbeddingBackend::OpenAi(c) => c.model_name(),
            EmbeddingBackend::Hash(c) => c.model_name(),
        }
    }

    /// Provider-appropriate batch size: each batch maps to one request, so
    /// a failing batch does not discard earlier ones.
    pub fn batch_size(&self) -> usize {
        match &self.backend {
            EmbeddingBackend::OpenAi(_) => 256,
            EmbeddingBackend::Hash(_) => 64,
        }
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        Ok(vectors.pop().unwrap_or_default())
    }

    /// Embed multiple texts in one provider round-trip.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match &self.backend {
            EmbeddingBackend::OpenAi(c) => c.embed_batch(texts).await,
            EmbeddingBackend::Hash(c) => Ok(c.embed_batch(texts)),
        }
    }
}

fn read_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|k| !k.trim().is_empty())
}
