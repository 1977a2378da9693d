//! Workspace lifecycle, ACL round trips, and soft-delete visibility.

mod common;

use std::sync::Arc;

use uuid::Uuid;

use common::TestApp;
use ragspace_core::domain::{Actor, AclRole, WorkspaceVisibility};
use ragspace_core::ports::repositories::DocumentSort;
use ragspace_core::ports::{AclRepository, DocumentRepository, WorkspaceRepository};
use ragspace_core::services::CreateWorkspaceInput;

#[tokio::test]
async fn create_enforces_admin_and_name_uniqueness() {
    let app = TestApp::new();
    let admin = Actor::admin(Uuid::new_v4());
    let employee = Actor::employee(Uuid::new_v4());

    let err = app
        .workspaces
        .create(
            &employee,
            CreateWorkspaceInput {
                name: "Legal".into(),
                description: None,
                visibility: WorkspaceVisibility::Private,
                owner_user_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "FORBIDDEN");

    let created = app
        .workspaces
        .create(
            &admin,
            CreateWorkspaceInput {
                name: "Legal".into(),
                description: Some("contracts".into()),
                visibility: WorkspaceVisibility::Private,
                owner_user_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(created.name, "Legal");

    // Uniqueness is case-insensitive per owner.
    let err = app
        .workspaces
        .create(
            &admin,
            CreateWorkspaceInput {
                name: "legal".into(),
                description: None,
                visibility: WorkspaceVisibility::Private,
                owner_user_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "CONFLICT");
}

#[tokio::test]
async fn archive_is_idempotent_and_cascades_soft_delete() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;
    let document_id = app
        .ingest_text(workspace_id, &actor, "Doc", "indexed content")
        .await;

    app.workspaces.archive(&actor, workspace_id).await.unwrap();
    // Second archive succeeds without state change.
    app.workspaces.archive(&actor, workspace_id).await.unwrap();

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    assert!(repo.get_document(document_id).await.unwrap().is_none());
    assert!(repo
        .list_documents(workspace_id, DocumentSort::CreatedAtDesc, 10, 0)
        .await
        .unwrap()
        .is_empty());

    // Archived workspaces disappear from default listings.
    let ws_repo: Arc<dyn WorkspaceRepository> = app.store.clone();
    let listed = ws_repo
        .list_workspaces(
            ragspace_core::ports::repositories::WorkspaceFilter::Owner(owner),
            false,
        )
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn soft_deleted_documents_never_surface_in_retrieval() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;
    let document_id = app
        .ingest_text(workspace_id, &actor, "Doc", "the secret ingredient is thyme")
        .await;

    app.documents
        .delete(&actor, workspace_id, document_id)
        .await
        .unwrap();

    let answer = app
        .answer
        .ask(ragspace_core::services::AskRequest {
            workspace_id,
            actor,
            query: "what is the secret ingredient?".into(),
            top_k: Some(5),
            use_mmr: None,
            conversation_id: None,
        })
        .await
        .unwrap();
    assert!(answer.sources.is_empty());

    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    assert!(repo
        .list_documents(workspace_id, DocumentSort::CreatedAtDesc, 10, 0)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn replace_acl_round_trips_deduplicated_in_order() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let u1 = Uuid::new_v4();
    let u2 = Uuid::new_v4();
    app.workspaces
        .share(
            &actor,
            workspace_id,
            &[
                (u1, AclRole::Viewer),
                (u2, AclRole::Editor),
                (u1, AclRole::Viewer),
            ],
        )
        .await
        .unwrap();

    let acl: Arc<dyn AclRepository> = app.store.clone();
    let user_ids = acl.list_workspace_acl(workspace_id).await.unwrap();
    assert_eq!(user_ids.len(), 2);
    assert!(user_ids.contains(&u1));
    assert!(user_ids.contains(&u2));

    // Replacing again fully overwrites the previous set.
    app.workspaces
        .share(&actor, workspace_id, &[(u2, AclRole::Viewer)])
        .await
        .unwrap();
    assert_eq!(acl.list_workspace_acl(workspace_id).await.unwrap(), vec![u2]);
}

#[tokio::test]
async fn grant_and_revoke_individual_entries() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let outsider = Actor::employee(Uuid::new_v4());
    let member = Uuid::new_v4();
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Shared)
        .await;

    // Non-owners cannot manage the ACL.
    let err = app
        .workspaces
        .grant_acl(&outsider, workspace_id, member, AclRole::Viewer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "FORBIDDEN");

    app.workspaces
        .grant_acl(&actor, workspace_id, member, AclRole::Editor)
        .await
        .unwrap();
    let entries = app.workspaces.list_acl(&actor, workspace_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].role, AclRole::Editor);
    assert_eq!(entries[0].granted_by, actor.user_id);

    assert!(app
        .workspaces
        .revoke_acl(&actor, workspace_id, member)
        .await
        .unwrap());
    assert!(app
        .workspaces
        .list_acl(&actor, workspace_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn publish_opens_org_read_access() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let colleague = Actor::employee(Uuid::new_v4());
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    let err = app.workspaces.get(&colleague, workspace_id).await.unwrap_err();
    assert_eq!(err.kind(), "FORBIDDEN");

    app.workspaces.publish(&actor, workspace_id).await.unwrap();

    let seen = app.workspaces.get(&colleague, workspace_id).await.unwrap();
    assert_eq!(seen.visibility, WorkspaceVisibility::OrgRead);
}

#[tokio::test]
async fn cancel_processing_is_admin_only_and_records_actor() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let actor = Actor::employee(owner);
    let admin = Actor::admin(Uuid::new_v4());
    let workspace_id = app
        .seed_workspace(owner, "ws", WorkspaceVisibility::Private)
        .await;

    // Park a document in PROCESSING.
    let repo: Arc<dyn DocumentRepository> = app.store.clone();
    let mut document = ragspace_core::domain::Document::new(Uuid::new_v4(), workspace_id, "stuck");
    document.status = Some(ragspace_core::domain::DocumentStatus::Processing);
    repo.save_document(&document).await.unwrap();

    let err = app
        .documents
        .cancel_processing(&actor, workspace_id, document.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "FORBIDDEN");

    app.documents
        .cancel_processing(&admin, workspace_id, document.id)
        .await
        .unwrap();

    let status = app
        .documents
        .status(&admin, workspace_id, document.id)
        .await
        .unwrap();
    assert_eq!(
        status.status,
        Some(ragspace_core::domain::DocumentStatus::Failed)
    );
    assert!(status
        .error_message
        .unwrap()
        .contains(&admin.user_id.unwrap().to_string()));
}
