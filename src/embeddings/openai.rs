// src/embeddings/openai.rs
// OpenAI-compatible embeddings API client

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// Max characters to embed (longer text is truncated)
const MAX_TEXT_CHARS: usize = 8000;

const MODEL_NAME: &str = "text-embedding-3-small";
const DIMENSION: usize = 1536;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'static str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for the `/v1/embeddings` endpoint of an OpenAI-compatible API.
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiEmbedder {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn dimension(&self) -> usize {
        DIMENSION
    }

    pub fn model_name(&self) -> &'static str {
        MODEL_NAME
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let input: Vec<&str> = texts
            .iter()
            .map(|t| {
                let end = t
                    .char_indices()
                    .nth(MAX_TEXT_CHARS)
                    .map(|(i, _)| i)
                    .unwrap_or(t.len());
                &t[..end]
            })
            .collect();

        let response = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: MODEL_NAME,
                input,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                ServerError::transient(format!("embeddings API failure ({status}): {body}"))
            } else {
                ServerError::internal(format!("embeddings API rejected request ({status}): {body}"))
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        parsed.data.sort_by_key(|row| row.index);
        if parsed.data.len() != texts.len() {
            return Err(ServerError::internal(format!(
                "embeddings API returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|row| row.embedding).collect())
    }
}
