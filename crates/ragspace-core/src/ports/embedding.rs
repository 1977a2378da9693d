use async_trait::async_trait;

use crate::error::CoreResult;

/// Embedding provider port. Implementations must preserve order and length
/// on the batch path and surface failures as typed `EMBEDDING_ERROR`s.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier used in cache keys.
    fn model_id(&self) -> &str;

    async fn embed_query(&self, text: &str) -> CoreResult<Vec<f32>>;

    /// Must return exactly one vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>>;
}
