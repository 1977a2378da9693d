use std::time::Duration;

use async_trait::async_trait;

use crate::error::CoreResult;

/// Object-store port. Keys are opaque paths like `documents/{uuid}/{name}`.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn upload(&self, key: &str, bytes: &[u8], mime_type: &str) -> CoreResult<()>;

    async fn download(&self, key: &str) -> CoreResult<Vec<u8>>;

    async fn delete(&self, key: &str) -> CoreResult<()>;

    async fn presigned_url(
        &self,
        key: &str,
        ttl: Duration,
        download_name: &str,
    ) -> CoreResult<String>;
}
