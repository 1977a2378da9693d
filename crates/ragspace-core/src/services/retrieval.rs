//! Shared retrieval pipeline: embed the query, search the workspace's
//! chunks (plain top-k or MMR), build the bounded context, and report
//! per-stage timings. Used by both the sync and streaming answer flows.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::Chunk;
use crate::error::{CoreError, CoreResult};
use crate::ports::DocumentRepository;
use crate::timing::StageTimings;

use super::context::ContextBuilder;
use super::embedding_cache::CachingEmbedder;

/// Canonical user-visible answer when retrieval finds no evidence.
pub const NO_RESULTS_ANSWER: &str =
    "No hay evidencia suficiente en las fuentes. ¿Podés precisar más (keywords/fecha/documento)?";

pub const DEFAULT_MMR_FETCH_MULTIPLIER: usize = 4;
pub const DEFAULT_MMR_LAMBDA: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    pub top_k: i64,
    pub use_mmr: bool,
    pub workspace_id: Uuid,
}

#[derive(Debug)]
pub struct RetrievalResult {
    pub query: String,
    pub top_k: i64,
    pub use_mmr: bool,
    /// Only the chunks that entered the context.
    pub chunks: Vec<Chunk>,
    pub chunks_found: usize,
    pub chunks_used: usize,
    pub context: String,
    pub context_chars: usize,
    pub timings: StageTimings,
}

impl RetrievalResult {
    fn empty(request: &RetrievalRequest, timings: StageTimings) -> Self {
        Self {
            query: request.query.clone(),
            top_k: request.top_k,
            use_mmr: request.use_mmr,
            chunks: Vec::new(),
            chunks_found: 0,
            chunks_used: 0,
            context: String::new(),
            context_chars: 0,
            timings,
        }
    }

    pub fn has_evidence(&self) -> bool {
        !self.chunks.is_empty()
    }

    /// Canonical fallback so callers never duplicate the string.
    pub fn fallback_answer(&self) -> &'static str {
        NO_RESULTS_ANSWER
    }
}

pub struct RetrievalPipeline {
    repository: Arc<dyn DocumentRepository>,
    embedder: Arc<CachingEmbedder>,
    context_builder: ContextBuilder,
}

impl RetrievalPipeline {
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        embedder: Arc<CachingEmbedder>,
        context_builder: ContextBuilder,
    ) -> Self {
        Self {
            repository,
            embedder,
            context_builder,
        }
    }

    pub async fn run(&self, request: &RetrievalRequest) -> CoreResult<RetrievalResult> {
        let mut timings = StageTimings::new();

        if request.workspace_id.is_nil() {
            return Err(CoreError::validation("workspace_id is required"));
        }
        if request.query.trim().is_empty() {
            return Err(CoreError::validation("query is required"));
        }

        // top_k <= 0 touches no service.
        if request.top_k <= 0 {
            return Ok(RetrievalResult::empty(request, timings));
        }
        let top_k = request.top_k as usize;

        let query_embedding = timings
            .measure("embed", self.embedder.embed_query(&request.query))
            .await?;

        let chunks = timings
            .measure("retrieve", async {
                if request.use_mmr {
                    let fetch_k = top_k.max(top_k * DEFAULT_MMR_FETCH_MULTIPLIER);
                    self.repository
                        .find_similar_chunks_mmr(
                            &query_embedding,
                            top_k,
                            fetch_k,
                            DEFAULT_MMR_LAMBDA,
                            request.workspace_id,
                        )
                        .await
                } else {
                    self.repository
                        .find_similar_chunks(&query_embedding, top_k, request.workspace_id)
                        .await
                }
            })
            .await?;

        let chunks_found = chunks.len();
        if chunks.is_empty() {
            info!(
                workspace_id = %request.workspace_id,
                top_k,
                "no chunks found for query"
            );
            return Ok(RetrievalResult::empty(request, timings));
        }

        let (context, chunks_used) =
            timings.measure_sync("build_context", || self.context_builder.build(&chunks));

        let selected: Vec<Chunk> = chunks.into_iter().take(chunks_used).collect();

        info!(
            workspace_id = %request.workspace_id,
            chunks_found,
            chunks_used,
            context_chars = context.chars().count(),
            embed_ms = timings.get_ms("embed").unwrap_or(0),
            retrieve_ms = timings.get_ms("retrieve").unwrap_or(0),
            build_context_ms = timings.get_ms("build_context").unwrap_or(0),
            "retrieval completed"
        );

        Ok(RetrievalResult {
            query: request.query.clone(),
            top_k: request.top_k,
            use_mmr: request.use_mmr,
            chunks: selected,
            chunks_found,
            chunks_used,
            context_chars: context.chars().count(),
            context,
            timings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use mockall::predicate::{always, eq};

    use crate::domain::Chunk;
    use crate::ports::repositories::MockDocumentRepository;
    use crate::ports::EmbeddingProvider;
    use crate::services::cache::InMemoryEmbeddingCache;
    use crate::services::embedding_cache::CachingEmbedder;
    use crate::services::fake::FakeEmbeddingProvider;

    /// Fails the test if any embedding is requested.
    struct PanicProvider;

    #[async_trait]
    impl EmbeddingProvider for PanicProvider {
        fn model_id(&self) -> &str {
            "panic"
        }

        async fn embed_query(&self, _text: &str) -> crate::CoreResult<Vec<f32>> {
            panic!("embed_query must not be called");
        }

        async fn embed_batch(&self, _texts: &[String]) -> crate::CoreResult<Vec<Vec<f32>>> {
            panic!("embed_batch must not be called");
        }
    }

    fn pipeline_with(
        repository: MockDocumentRepository,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> RetrievalPipeline {
        RetrievalPipeline::new(
            Arc::new(repository),
            Arc::new(CachingEmbedder::new(
                provider,
                Arc::new(InMemoryEmbeddingCache::new(100, Duration::from_secs(60))),
            )),
            ContextBuilder::new(10_000),
        )
    }

    fn request(top_k: i64, use_mmr: bool) -> RetrievalRequest {
        RetrievalRequest {
            query: "what is the policy?".into(),
            top_k,
            use_mmr,
            workspace_id: Uuid::new_v4(),
        }
    }

    fn chunk(content: &str) -> Chunk {
        let mut chunk = Chunk::new(Uuid::new_v4(), 0, content.into(), vec![0.1; 4]);
        chunk.similarity = Some(0.9);
        chunk
    }

    #[tokio::test]
    async fn top_k_zero_touches_no_service() {
        // No expectations on the mock: any repository call panics. The
        // panic provider does the same for the embedder.
        let pipeline = pipeline_with(MockDocumentRepository::new(), Arc::new(PanicProvider));

        let result = pipeline.run(&request(0, false)).await.unwrap();
        assert_eq!(result.chunks_found, 0);
        assert_eq!(result.context, "");
        assert_eq!(result.fallback_answer(), NO_RESULTS_ANSWER);
    }

    #[tokio::test]
    async fn nil_workspace_and_blank_query_are_usage_errors() {
        let pipeline = pipeline_with(MockDocumentRepository::new(), Arc::new(PanicProvider));

        let mut bad_workspace = request(3, false);
        bad_workspace.workspace_id = Uuid::nil();
        let err = pipeline.run(&bad_workspace).await.unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");

        let mut blank = request(3, false);
        blank.query = "   ".into();
        let err = pipeline.run(&blank).await.unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn plain_branch_queries_top_k() {
        let mut repository = MockDocumentRepository::new();
        repository
            .expect_find_similar_chunks()
            .with(always(), eq(3usize), always())
            .once()
            .returning(|_, _, _| Ok(vec![chunk("a"), chunk("b")]));

        let pipeline = pipeline_with(repository, Arc::new(FakeEmbeddingProvider::new(4)));
        let result = pipeline.run(&request(3, false)).await.unwrap();

        assert_eq!(result.chunks_found, 2);
        assert_eq!(result.chunks_used, 2);
        assert!(result.context.contains("---[FRAGMENTO 1]---"));
        assert!(result.timings.get_ms("embed").is_some());
        assert!(result.timings.get_ms("retrieve").is_some());
        assert!(result.timings.get_ms("build_context").is_some());
    }

    #[tokio::test]
    async fn mmr_branch_fetches_four_times_top_k() {
        let mut repository = MockDocumentRepository::new();
        repository
            .expect_find_similar_chunks_mmr()
            .with(always(), eq(3usize), eq(12usize), eq(0.5f32), always())
            .once()
            .returning(|_, _, _, _, _| Ok(vec![chunk("diverse")]));

        let pipeline = pipeline_with(repository, Arc::new(FakeEmbeddingProvider::new(4)));
        let result = pipeline.run(&request(3, true)).await.unwrap();
        assert_eq!(result.chunks_found, 1);
    }

    #[tokio::test]
    async fn zero_hits_yield_empty_context_with_fallback_available() {
        let mut repository = MockDocumentRepository::new();
        repository
            .expect_find_similar_chunks()
            .once()
            .returning(|_, _, _| Ok(Vec::new()));

        let pipeline = pipeline_with(repository, Arc::new(FakeEmbeddingProvider::new(4)));
        let result = pipeline.run(&request(5, false)).await.unwrap();

        assert!(!result.has_evidence());
        assert_eq!(result.context, "");
        assert_eq!(result.fallback_answer(), NO_RESULTS_ANSWER);
        // build_context never ran.
        assert_eq!(result.timings.get_ms("build_context"), None);
    }

    #[tokio::test]
    async fn used_set_is_limited_to_chunks_in_context() {
        let mut repository = MockDocumentRepository::new();
        repository
            .expect_find_similar_chunks()
            .once()
            .returning(|_, _, _| Ok((0..10usize).map(|i| chunk(&"x".repeat(200 + i))).collect()));

        let pipeline = RetrievalPipeline::new(
            Arc::new(repository),
            Arc::new(CachingEmbedder::new(
                Arc::new(FakeEmbeddingProvider::new(4)),
                Arc::new(InMemoryEmbeddingCache::new(100, Duration::from_secs(60))),
            )),
            // Small budget: only a few blocks fit.
            ContextBuilder::new(900),
        );

        let result = pipeline.run(&request(10, false)).await.unwrap();
        assert_eq!(result.chunks.len(), result.chunks_used);
        assert!(result.chunks_used < result.chunks_found);
    }
}
