use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

mod error;
mod handlers;
mod state;

use ragspace_core::config::{CacheBackend, Settings};
use ragspace_core::database::{
    DbPool, PostgresAclRepository, PostgresDocumentRepository, PostgresWorkspaceRepository,
};
use ragspace_core::document::TextChunker;
use ragspace_core::ingestion::{ProcessDocumentUseCase, UploadDocumentUseCase};
use ragspace_core::ports::{
    AclRepository, DocumentRepository, EmbeddingCachePort, EmbeddingProvider, FileStorage,
    JobQueue, LlmProvider, WorkspaceRepository,
};
use ragspace_core::queue::MemoryJobQueue;
use ragspace_core::retry::RetryPolicy;
use ragspace_core::services::{
    AnswerUseCase, CachingEmbedder, ContextBuilder, ConversationStore, DocumentService,
    FakeEmbeddingProvider, FakeLlmProvider, InMemoryEmbeddingCache, PromptComposer,
    RedisEmbeddingCache, RetrievalPipeline, WorkspaceService,
};
use ragspace_core::providers::{HttpEmbeddingProvider, HttpLlmProvider};
use ragspace_core::storage::FsFileStorage;

use state::AppState;

const WORKER_CONCURRENCY: usize = 2;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,ragspace_server=debug,ragspace_core=debug".to_string()),
        )
        .with_target(true)
        .json()
        .init();

    info!("starting ragspace server");

    let settings = Settings::load()?;

    let db = DbPool::connect(&settings.database).await?;
    db.run_migrations().await?;
    info!("database ready");

    let documents: Arc<dyn DocumentRepository> =
        Arc::new(PostgresDocumentRepository::new(db.clone()));
    let workspaces: Arc<dyn WorkspaceRepository> =
        Arc::new(PostgresWorkspaceRepository::new(db.clone()));
    let acl: Arc<dyn AclRepository> = Arc::new(PostgresAclRepository::new(db.clone()));

    let storage: Arc<dyn FileStorage> = Arc::new(FsFileStorage::new(&settings.storage.root_dir));

    let queue = MemoryJobQueue::new();
    let queue_port: Arc<dyn JobQueue> = queue.clone();

    // Providers: deterministic fakes or the OpenAI-compatible HTTP adapters.
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

    let llm: Arc<dyn LlmProvider> = if settings.llm.fake_llm {
        info!("using fake llm");
        Arc::new(FakeLlmProvider)
    } else {
        let composer = Arc::new(PromptComposer::from_config(&settings.prompts)?);
        // Fail at startup, not on the first request, if templates are broken.
        composer.template()?;
        Arc::new(HttpLlmProvider::new(settings.llm.clone(), composer))
    };

    let retry = RetryPolicy::from(&settings.retry);

    let retrieval = Arc::new(RetrievalPipeline::new(
        documents.clone(),
        embedder.clone(),
        ContextBuilder::new(settings.rag.max_context_chars),
    ));
    let conversations = Arc::new(ConversationStore::new(
        settings.rag.max_conversation_messages,
    ));

    let answer = AnswerUseCase::new(
        workspaces.clone(),
        acl.clone(),
        retrieval,
        llm,
        conversations.clone(),
        retry.clone(),
        settings.rag.clone(),
    );

    let upload = UploadDocumentUseCase::new(
        documents.clone(),
        workspaces.clone(),
        Some(storage.clone()),
        Some(queue_port.clone()),
        settings.rag.max_upload_bytes,
    );

    let document_service = DocumentService::new(
        documents.clone(),
        workspaces.clone(),
        acl.clone(),
        Some(storage.clone()),
        Some(queue_port),
    );
    let workspace_service = WorkspaceService::new(workspaces.clone(), acl.clone());

    // In-process workers drain the job queue; a separate worker binary
    // handles deployments where the queue is external.
    for worker_id in 0..WORKER_CONCURRENCY {
        let processor = ProcessDocumentUseCase::new(
            documents.clone(),
            Some(storage.clone()),
            TextChunker::from_config(&settings.rag)?,
            embedder.clone(),
            retry.clone(),
        );
        let receiver = queue.receiver();
        tokio::spawn(async move {
            info!(worker_id, "ingestion worker started");
            while let Ok(job) = receiver.recv_async().await {
                if let Err(error) = processor.execute(&job).await {
                    tracing::error!(
                        worker_id,
                        document_id = %job.document_id,
                        error = %error,
                        "job execution error"
                    );
                }
            }
        });
    }

    let state = Arc::new(AppState {
        db: Some(db),
        workspaces: workspace_service,
        documents: document_service,
        upload,
        answer,
        conversations,
    });

    let app = build_router(state, settings.rag.max_upload_bytes);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check));

    let api = Router::new()
        // Workspaces
        .route(
            "/api/workspaces",
            post(handlers::workspaces::create_workspace).get(handlers::workspaces::list_workspaces),
        )
        .route(
            "/api/workspaces/{workspace_id}",
            get(handlers::workspaces::get_workspace).patch(handlers::workspaces::update_workspace),
        )
        .route(
            "/api/workspaces/{workspace_id}/archive",
            post(handlers::workspaces::archive_workspace),
        )
        .route(
            "/api/workspaces/{workspace_id}/publish",
            post(handlers::workspaces::publish_workspace),
        )
        .route(
            "/api/workspaces/{workspace_id}/share",
            post(handlers::workspaces::share_workspace),
        )
        .route(
            "/api/workspaces/{workspace_id}/acl",
            get(handlers::workspaces::list_acl).post(handlers::workspaces::grant_acl),
        )
        .route(
            "/api/workspaces/{workspace_id}/acl/{user_id}",
            delete(handlers::workspaces::revoke_acl),
        )
        // Documents
        .route(
            "/api/workspaces/{workspace_id}/documents",
            get(handlers::documents::list_documents).post(handlers::documents::upload_document),
        )
        .route(
            "/api/workspaces/{workspace_id}/documents/{document_id}",
            get(handlers::documents::get_document).delete(handlers::documents::delete_document),
        )
        .route(
            "/api/workspaces/{workspace_id}/documents/{document_id}/download-url",
            get(handlers::documents::download_url),
        )
        .route(
            "/api/workspaces/{workspace_id}/documents/{document_id}/status",
            get(handlers::documents::document_status),
        )
        .route(
            "/api/workspaces/{workspace_id}/documents/{document_id}/reprocess",
            post(handlers::documents::reprocess_document),
        )
        .route(
            "/api/workspaces/{workspace_id}/documents/{document_id}/cancel",
            post(handlers::documents::cancel_processing),
        )
        // Ask
        .route("/api/workspaces/{workspace_id}/ask", post(handlers::ask::ask))
        .route(
            "/api/workspaces/{workspace_id}/ask/stream",
            post(handlers::ask::ask_stream),
        )
        // Conversations
        .route(
            "/api/conversations",
            post(handlers::conversations::create_conversation),
        )
        .route(
            "/api/conversations/{conversation_id}",
            get(handlers::conversations::get_history)
                .delete(handlers::conversations::clear_conversation),
        );

    Router::new()
        .merge(public)
        .merge(api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_upload_bytes + 1024 * 1024))
}
