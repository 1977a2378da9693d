use std::sync::Arc;

use anyhow::Result;
use tracing::info;

mod metrics;
mod worker;

use ragspace_core::config::{CacheBackend, Settings};
use ragspace_core::database::{DbPool, PostgresDocumentRepository};
use ragspace_core::document::TextChunker;
use ragspace_core::ingestion::ProcessDocumentUseCase;
use ragspace_core::ports::{DocumentRepository, EmbeddingCachePort, EmbeddingProvider, FileStorage};
use ragspace_core::providers::HttpEmbeddingProvider;
use ragspace_core::retry::RetryPolicy;
use ragspace_core::services::{
    CachingEmbedder, FakeEmbeddingProvider, InMemoryEmbeddingCache, RedisEmbeddingCache,
};
use ragspace_core::storage::FsFileStorage;

use worker::Worker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,ragspace_worker=debug,ragspace_core=debug".to_string()),
        )
        .with_target(true)
        .json()
        .init();

    info!("starting ragspace worker");

    let settings = Settings::load()?;

    let db = DbPool::connect(&settings.database).await?;
    let documents: Arc<dyn DocumentRepository> =
        Arc::new(PostgresDocumentRepository::new(db.clone()));

    let storage: Arc<dyn FileStorage> = Arc::new(FsFileStorage::new(&settings.storage.root_dir));

    let embedding_provider: Arc<dyn EmbeddingProvider> = if settings.embedding.fake_embeddings {
        info!("using fake embeddings");
        Arc::new(FakeEmbeddingProvider::new(settings.embedding.dimension))
    } else {
        Arc::new(HttpEmbeddingProvider::new(&settings.embedding))
    };

    let cache: Arc<dyn EmbeddingCachePort> = match settings.cache.embedding_cache_backend {
        CacheBackend::Memory => Arc::new(InMemoryEmbeddingCache::from_config(&settings.cache)),
        CacheBackend::Redis => {
            let url = settings
                .cache
                .redis_url
                .as_deref()
                .expect("validated at load time");
            Arc::new(RedisEmbeddingCache::connect(url, settings.cache.ttl_seconds).await?)
        }
    };
    let embedder = Arc::new(CachingEmbedder::new(embedding_provider, cache));

    let processor = ProcessDocumentUseCase::new(
        documents.clone(),
        Some(storage),
        TextChunker::from_config(&settings.rag)?,
        embedder,
        RetryPolicy::from(&settings.retry),
    );

    Worker::new(documents, processor).run().await
}
