use async_trait::async_trait;

use crate::error::CoreResult;

/// Embedding cache port. The caching facade treats any error from these
/// operations as a miss; implementations should still report failures so
/// they can be logged.
#[async_trait]
pub trait EmbeddingCachePort: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<f32>>>;

    async fn set(&self, key: &str, embedding: &[f32]) -> CoreResult<()>;
}
