//! Vector index adapter laws: atomic save + search round trip, workspace
//! verification, dimension validation, and reprocess steady state.

mod common;

use std::sync::Arc;

use uuid::Uuid;

use common::TestApp;
use ragspace_core::domain::{Actor, Chunk, Document, DocumentStatus, WorkspaceVisibility, EMBEDDING_DIMENSION};
use ragspace_core::ports::DocumentRepository;

fn unit_vector(hot: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIMENSION];
    v[hot] = 1.0;
    v
}

#[tokio::test]
async fn saved_chunk_is_found_with_its_own_embedding() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let document = Document::new(Uuid::new_v4(), workspace_id, "doc");
    let chunks = vec![
        Chunk::new(document.id, 0, "first".into(), unit_vector(0)),
        Chunk::new(document.id, 1, "second".into(), unit_vector(1)),
    ];
    let first_id = chunks[0].chunk_id;

    repo.save_document_with_chunks(&document, &chunks)
        .await
        .unwrap();

    let found = repo
        .find_similar_chunks(&unit_vector(0), 1, workspace_id)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].chunk_id, first_id);
    assert!(found[0].similarity.unwrap() >= 0.99);
}

#[tokio::test]
async fn wrong_dimension_embeddings_are_rejected() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let document = Document::new(Uuid::new_v4(), workspace_id, "doc");
    let bad = vec![Chunk::new(document.id, 0, "short".into(), vec![0.5; 16])];

    let err = repo
        .save_document_with_chunks(&document, &bad)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn save_chunks_verifies_workspace_ownership() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let workspace_id = app
        .seed_workspace(owner, "ws-a", WorkspaceVisibility::Private)
        .await;
    let other_workspace = app
        .seed_workspace(owner, "ws-b", WorkspaceVisibility::Private)
        .await;

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let document = Document::new(Uuid::new_v4(), workspace_id, "doc");
    repo.save_document(&document).await.unwrap();

    let chunks = vec![Chunk::new(document.id, 0, "c".into(), unit_vector(2))];
    let err = repo
        .save_chunks(document.id, &chunks, other_workspace)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");

    repo.save_chunks(document.id, &chunks, workspace_id)
        .await
        .unwrap();
    assert_eq!(repo.count_chunks_for_document(document.id).await.unwrap(), 1);
}

#[tokio::test]
async fn reprocessing_a_ready_document_ends_ready() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let document_id = app
        .ingest_text(workspace_id, &actor, "Doc", "stable content to re-index")
        .await;

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let before = repo.count_chunks_for_document(document_id).await.unwrap();
    assert!(before >= 1);

    app.documents
        .reprocess(&actor, workspace_id, document_id)
        .await
        .unwrap();

    // PENDING while queued, then back to READY through PROCESSING.
    let pending = repo.get_document(document_id).await.unwrap().unwrap();
    assert_eq!(pending.status, Some(DocumentStatus::Pending));

    app.drain_jobs().await;

    let after = repo.get_document(document_id).await.unwrap().unwrap();
    assert_eq!(after.status, Some(DocumentStatus::Ready));
    assert_eq!(
        repo.count_chunks_for_document(document_id).await.unwrap(),
        before
    );
}

#[tokio::test]
async fn mmr_results_are_unique_and_bounded() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let document = Document::new(Uuid::new_v4(), workspace_id, "doc");
    let chunks: Vec<Chunk> = (0..8)
        .map(|i| Chunk::new(document.id, i as i32, format!("c{i}"), unit_vector(i)))
        .collect();
    repo.save_document_with_chunks(&document, &chunks)
        .await
        .unwrap();

    let selected = repo
        .find_similar_chunks_mmr(&unit_vector(0), 3, 8, 0.5, workspace_id)
        .await
        .unwrap();

    assert_eq!(selected.len(), 3);
    let mut ids: Vec<Uuid> = selected.iter().map(|c| c.chunk_id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}
