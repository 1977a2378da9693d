//! OpenAI-compatible embedding provider over HTTP.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{CoreError, CoreResult};
use crate::ports::EmbeddingProvider;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct HttpEmbeddingProvider {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    api_key: Option<String>,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
            api_key: config.api_key.clone(),
        }
    }

    async fn request_embeddings(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        debug!(texts = texts.len(), model = %self.model, "embedding request");

        let mut builder = self.client.post(&url).json(&EmbeddingRequest {
            input: texts,
            model: &self.model,
        });
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CoreError::embedding(format!("Failed to reach embedding server: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::embedding_with_status(
                format!("Embedding API error ({status}): {body}"),
                status.as_u16(),
            ));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CoreError::embedding(format!("Malformed embedding response: {e}")))?;

        if body.data.len() != texts.len() {
            return Err(CoreError::embedding(format!(
                "Embedding response length mismatch: expected {}, got {}",
                texts.len(),
                body.data.len()
            )));
        }

        let mut out = Vec::with_capacity(body.data.len());
        for data in body.data {
            if data.embedding.len() != self.dimension {
                return Err(CoreError::embedding(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    data.embedding.len()
                )));
            }
            out.push(data.embedding);
        }
        Ok(out)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed_query(&self, text: &str) -> CoreResult<Vec<f32>> {
        let mut result = self.request_embeddings(&[text.to_string()]).await?;
        result
            .pop()
            .ok_or_else(|| CoreError::embedding("Empty data array from embedding server"))
    }

    async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(texts).await
    }
}
