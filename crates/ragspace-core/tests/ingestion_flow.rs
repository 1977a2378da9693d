//! Ingestion pipeline: upload orchestration with compensation, the worker
//! state machine, and recovery from transient provider failures.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use common::{FlakyEmbeddingProvider, TestApp};
use ragspace_core::domain::status::{CLAIM_FROM, ENQUEUE_FROM};
use ragspace_core::domain::{Actor, DocumentStatus, WorkspaceVisibility};
use ragspace_core::error::{CoreError, CoreResult};
use ragspace_core::ingestion::{ProcessOutcome, UploadDocumentInput, UploadDocumentUseCase};
use ragspace_core::ports::{DocumentRepository, JobQueue, WorkspaceRepository};

fn upload_input(workspace_id: Uuid, actor: Actor, text: &str) -> UploadDocumentInput {
    UploadDocumentInput {
        workspace_id,
        actor,
        title: "Policies".to_string(),
        file_name: "policies.txt".to_string(),
        mime_type: "text/plain".to_string(),
        content: text.as_bytes().to_vec(),
        source: None,
        metadata: None,
        uploaded_by_user_id: actor.user_id,
    }
}

#[tokio::test]
async fn upload_persists_pending_and_enqueues() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let output = app
        .upload
        .execute(upload_input(workspace_id, actor, "some text"))
        .await
        .unwrap();

    assert_eq!(output.status, DocumentStatus::Pending);
    assert!(app
        .storage
        .contains(&format!("documents/{}/policies.txt", output.document_id)));
    assert_eq!(app.queue.pending(), 1);

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let document = repo.get_document(output.document_id).await.unwrap().unwrap();
    assert_eq!(document.status, Some(DocumentStatus::Pending));
    assert_eq!(
        document.storage_key.as_deref(),
        Some(format!("documents/{}/policies.txt", output.document_id).as_str())
    );
}

#[tokio::test]
async fn worker_processes_document_to_ready() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let output = app
        .upload
        .execute(upload_input(
            workspace_id,
            actor,
            "Expenses over $50 need approval.",
        ))
        .await
        .unwrap();

    let outcome = app.run_one_job().await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Ready { chunks_created } if chunks_created >= 1));

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let document = repo.get_document(output.document_id).await.unwrap().unwrap();
    assert_eq!(document.status, Some(DocumentStatus::Ready));
    assert_eq!(document.error_message, None);
    assert!(repo.count_chunks_for_document(output.document_id).await.unwrap() >= 1);
}

#[tokio::test]
async fn worker_recovers_from_two_transient_failures() {
    let app = TestApp::with_embedding_provider(Arc::new(FlakyEmbeddingProvider::new(2)));
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let output = app
        .upload
        .execute(upload_input(workspace_id, actor, "retryable content"))
        .await
        .unwrap();

    let outcome = app.run_one_job().await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Ready { .. }));

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let document = repo.get_document(output.document_id).await.unwrap().unwrap();
    assert_eq!(document.status, Some(DocumentStatus::Ready));
    assert_eq!(document.error_message, None);
}

#[tokio::test]
async fn worker_fails_after_exhausted_retries_and_stays_reprocessable() {
    let app = TestApp::with_embedding_provider(Arc::new(FlakyEmbeddingProvider::new(3)));
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let output = app
        .upload
        .execute(upload_input(workspace_id, actor, "doomed content"))
        .await
        .unwrap();

    let outcome = app.run_one_job().await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Failed { .. }));

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let document = repo.get_document(output.document_id).await.unwrap().unwrap();
    assert_eq!(document.status, Some(DocumentStatus::Failed));
    let message = document.error_message.unwrap();
    assert!(!message.is_empty());
    assert!(message.chars().count() <= 500);

    // The flaky provider has burned its failures; reprocessing succeeds.
    app.documents
        .reprocess(&actor, workspace_id, output.document_id)
        .await
        .unwrap();
    let outcome = app.run_one_job().await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Ready { .. }));

    let document = repo.get_document(output.document_id).await.unwrap().unwrap();
    assert_eq!(document.status, Some(DocumentStatus::Ready));
    assert_eq!(document.error_message, None);
}

#[tokio::test]
async fn ready_documents_are_noops_for_duplicate_jobs() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let document_id = app
        .ingest_text(workspace_id, &actor, "Doc", "content to index")
        .await;

    // At-least-once delivery: replay the same job body.
    let queue: Arc<dyn JobQueue> = app.queue.clone();
    queue
        .enqueue_document_processing(document_id, workspace_id)
        .await
        .unwrap();

    let outcome = app.run_one_job().await.unwrap();
    assert_eq!(
        outcome,
        ProcessOutcome::Noop {
            status: DocumentStatus::Ready
        }
    );
}

#[tokio::test]
async fn missing_documents_report_missing() {
    let app = TestApp::new();
    let queue: Arc<dyn JobQueue> = app.queue.clone();
    queue
        .enqueue_document_processing(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();

    let outcome = app.run_one_job().await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Missing);
}

#[tokio::test]
async fn missing_file_metadata_fails_with_stable_message() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    // A document row with no stored file.
    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let document = ragspace_core::domain::Document::new(Uuid::new_v4(), workspace_id, "bare");
    repo.save_document(&document).await.unwrap();

    let queue: Arc<dyn JobQueue> = app.queue.clone();
    queue
        .enqueue_document_processing(document.id, workspace_id)
        .await
        .unwrap();

    let outcome = app.run_one_job().await.unwrap();
    assert_eq!(
        outcome,
        ProcessOutcome::Failed {
            error_message: "Missing file metadata for processing".to_string()
        }
    );
}

#[tokio::test]
async fn enqueue_failure_parks_document_as_failed() {
    struct FailingQueue;

    #[async_trait]
    impl JobQueue for FailingQueue {
        async fn enqueue_document_processing(
            &self,
            _document_id: Uuid,
            _workspace_id: Uuid,
        ) -> CoreResult<String> {
            Err(CoreError::service_unavailable(
                "DocumentProcessingQueue",
                "broker down",
            ))
        }
    }

    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let document_repo: Arc<dyn DocumentRepository> = app.store.clone();
    let workspace_repo: Arc<dyn WorkspaceRepository> = app.store.clone();
    let upload = UploadDocumentUseCase::new(
        document_repo.clone(),
        workspace_repo,
        Some(app.storage.clone()),
        Some(Arc::new(FailingQueue)),
        10 * 1024 * 1024,
    );

    let err = upload
        .execute(upload_input(workspace_id, actor, "text"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "SERVICE_UNAVAILABLE");

    // The object and row remain; the document is parked FAILED with the
    // stable enqueue error.
    assert_eq!(app.storage.len(), 1);
    let state = app.store.clone();
    let repo: Arc<dyn DocumentRepository> = state;
    let documents = repo
        .list_documents(
            workspace_id,
            ragspace_core::ports::repositories::DocumentSort::CreatedAtDesc,
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].status, Some(DocumentStatus::Failed));
    assert_eq!(
        documents[0].error_message.as_deref(),
        Some("Failed to enqueue document processing job")
    );
}

#[tokio::test]
async fn status_graph_never_allows_pending_to_ready() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let mut document = ragspace_core::domain::Document::new(Uuid::new_v4(), workspace_id, "doc");
    document.status = Some(DocumentStatus::Pending);
    repo.save_document(&document).await.unwrap();

    // Direct PENDING -> READY is not a legal move: READY only leaves
    // PROCESSING.
    let moved = repo
        .transition_document_status(
            document.id,
            workspace_id,
            ragspace_core::domain::status::FINISH_FROM,
            DocumentStatus::Ready,
            None,
        )
        .await
        .unwrap();
    assert!(!moved);

    // The legal path: claim, then finish.
    assert!(repo
        .transition_document_status(
            document.id,
            workspace_id,
            CLAIM_FROM,
            DocumentStatus::Processing,
            None,
        )
        .await
        .unwrap());
    assert!(repo
        .transition_document_status(
            document.id,
            workspace_id,
            ragspace_core::domain::status::FINISH_FROM,
            DocumentStatus::Ready,
            None,
        )
        .await
        .unwrap());

    // READY -> PENDING is the reprocess edge.
    assert!(repo
        .transition_document_status(
            document.id,
            workspace_id,
            ENQUEUE_FROM,
            DocumentStatus::Pending,
            None,
        )
        .await
        .unwrap());
}
