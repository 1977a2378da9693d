//! Shared harness: the full core wired over in-memory adapters and
//! deterministic fakes.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use ragspace_core::config::{ChunkerMode, RagConfig};
use ragspace_core::database::InMemoryStore;
use ragspace_core::document::TextChunker;
use ragspace_core::domain::{Actor, Workspace, WorkspaceVisibility};
use ragspace_core::error::{CoreError, CoreResult};
use ragspace_core::ingestion::{ProcessDocumentUseCase, ProcessOutcome, UploadDocumentUseCase};
use ragspace_core::ports::queue::ProcessingJob;
use ragspace_core::ports::{
    AclRepository, DocumentRepository, EmbeddingProvider, FileStorage, JobQueue, LlmProvider,
    TokenStream, WorkspaceRepository,
};
use ragspace_core::queue::MemoryJobQueue;
use ragspace_core::retry::RetryPolicy;
use ragspace_core::services::{
    AnswerUseCase, CachingEmbedder, ContextBuilder, ConversationStore, DocumentService,
    FakeEmbeddingProvider, FakeLlmProvider, InMemoryEmbeddingCache, RetrievalPipeline,
    WorkspaceService,
};
use ragspace_core::storage::InMemoryFileStorage;

/// Counts model invocations so tests can prove the context-only policy.
pub struct SpyLlm {
    inner: FakeLlmProvider,
    pub answer_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
}

impl SpyLlm {
    pub fn new() -> Self {
        Self {
            inner: FakeLlmProvider,
            answer_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LlmProvider for SpyLlm {
    async fn generate_answer(&self, query: &str, context: &str) -> CoreResult<String> {
        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate_answer(query, context).await
    }

    async fn generate_stream(&self, query: &str, context: &str) -> CoreResult<TokenStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate_stream(query, context).await
    }
}

/// Embedding provider that fails its first `failures` calls with a 503.
pub struct FlakyEmbeddingProvider {
    inner: FakeEmbeddingProvider,
    remaining_failures: AtomicUsize,
}

impl FlakyEmbeddingProvider {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: FakeEmbeddingProvider::default(),
            remaining_failures: AtomicUsize::new(failures),
        }
    }

    fn maybe_fail(&self) -> CoreResult<()> {
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(CoreError::embedding_with_status("service unavailable", 503));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbeddingProvider {
    fn model_id(&self) -> &str {
        "flaky-embeddings"
    }

    async fn embed_query(&self, text: &str) -> CoreResult<Vec<f32>> {
        self.maybe_fail()?;
        self.inner.embed_query(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        self.maybe_fail()?;
        self.inner.embed_batch(texts).await
    }
}

pub fn test_rag_config() -> RagConfig {
    RagConfig {
        chunk_size: 900,
        chunk_overlap: 120,
        text_chunker_mode: ChunkerMode::Simple,
        max_context_chars: 12_000,
        max_top_k: 20,
        max_conversation_messages: 12,
        default_use_mmr: false,
        max_upload_bytes: 10 * 1024 * 1024,
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub storage: Arc<InMemoryFileStorage>,
    pub queue: Arc<MemoryJobQueue>,
    pub conversations: Arc<ConversationStore>,
    pub llm: Arc<SpyLlm>,
    pub answer: AnswerUseCase,
    pub upload: UploadDocumentUseCase,
    pub processor: ProcessDocumentUseCase,
    pub workspaces: WorkspaceService,
    pub documents: DocumentService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_embedding_provider(Arc::new(FakeEmbeddingProvider::default()))
    }

    pub fn with_embedding_provider(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let config = test_rag_config();
        let store = InMemoryStore::new();
        let storage = Arc::new(InMemoryFileStorage::new());
        let queue = MemoryJobQueue::new();
        let conversations = Arc::new(ConversationStore::new(config.max_conversation_messages));
        let llm = Arc::new(SpyLlm::new());

        let document_repo: Arc<dyn DocumentRepository> = store.clone();
        let workspace_repo: Arc<dyn WorkspaceRepository> = store.clone();
        let acl_repo: Arc<dyn AclRepository> = store.clone();
        let storage_port: Arc<dyn FileStorage> = storage.clone();
        let queue_port: Arc<dyn JobQueue> = queue.clone();

        let embedder = Arc::new(CachingEmbedder::new(
            provider,
            Arc::new(InMemoryEmbeddingCache::new(1000, Duration::from_secs(600))),
        ));

        let retrieval = Arc::new(RetrievalPipeline::new(
            document_repo.clone(),
            embedder.clone(),
            ContextBuilder::new(config.max_context_chars),
        ));

        let answer = AnswerUseCase::new(
            workspace_repo.clone(),
            acl_repo.clone(),
            retrieval,
            llm.clone(),
            conversations.clone(),
            fast_retry(),
            config.clone(),
        );

        let upload = UploadDocumentUseCase::new(
            document_repo.clone(),
            workspace_repo.clone(),
            Some(storage_port.clone()),
            Some(queue_port.clone()),
            config.max_upload_bytes,
        );

        let processor = ProcessDocumentUseCase::new(
            document_repo.clone(),
            Some(storage_port.clone()),
            TextChunker::from_config(&config).unwrap(),
            embedder,
            fast_retry(),
        );

        let workspaces = WorkspaceService::new(workspace_repo.clone(), acl_repo.clone());
        let documents = DocumentService::new(
            document_repo,
            workspace_repo,
            acl_repo,
            Some(storage_port),
            Some(queue_port),
        );

        Self {
            store,
            storage,
            queue,
            conversations,
            llm,
            answer,
            upload,
            processor,
            workspaces,
            documents,
        }
    }

    /// Create a workspace owned by `owner` directly in the store.
    pub async fn seed_workspace(
        &self,
        owner: Uuid,
        name: &str,
        visibility: WorkspaceVisibility,
    ) -> Uuid {
        let workspace = Workspace {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            visibility,
            owner_user_id: Some(owner),
            archived_at: None,
            created_at: None,
            updated_at: None,
        };
        let repo: Arc<dyn WorkspaceRepository> = self.store.clone();
        repo.create_workspace(&workspace).await.unwrap();
        workspace.id
    }

    /// Upload a text document and run every queued job to completion.
    pub async fn ingest_text(&self, workspace_id: Uuid, actor: &Actor, title: &str, text: &str) -> Uuid {
        let output = self
            .upload
            .execute(ragspace_core::ingestion::UploadDocumentInput {
                workspace_id,
                actor: *actor,
                title: title.to_string(),
                file_name: format!("{title}.txt"),
                mime_type: "text/plain".to_string(),
                content: text.as_bytes().to_vec(),
                source: None,
                metadata: None,
                uploaded_by_user_id: actor.user_id,
            })
            .await
            .unwrap();

        self.drain_jobs().await;
        output.document_id
    }

    pub async fn drain_jobs(&self) -> Vec<ProcessOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(job) = self.queue.receiver().try_recv() {
            outcomes.push(self.processor.execute(&job).await.unwrap());
        }
        outcomes
    }

    pub async fn run_one_job(&self) -> Option<ProcessOutcome> {
        let job: ProcessingJob = self.queue.receiver().try_recv().ok()?;
        Some(self.processor.execute(&job).await.unwrap())
    }
}
