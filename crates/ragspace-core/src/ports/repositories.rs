use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::status::StatusSet;
use crate::domain::{AclEntry, AclRole, Chunk, Document, DocumentStatus, Workspace};
use crate::error::CoreResult;

/// Sort keys accepted by document listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentSort {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
    TitleAsc,
    TitleDesc,
}

/// Listing scope for workspaces.
#[derive(Debug, Clone)]
pub enum WorkspaceFilter {
    Owner(Uuid),
    Visibility(crate::domain::WorkspaceVisibility),
    All,
}

#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    async fn create_workspace(&self, workspace: &Workspace) -> CoreResult<()>;

    async fn get_workspace(&self, workspace_id: Uuid) -> CoreResult<Option<Workspace>>;

    /// Case-insensitive lookup backing the per-owner uniqueness invariant.
    async fn get_workspace_by_owner_and_name(
        &self,
        owner_user_id: Uuid,
        name: &str,
    ) -> CoreResult<Option<Workspace>>;

    /// Archived workspaces are excluded unless `include_archived`.
    async fn list_workspaces(
        &self,
        filter: WorkspaceFilter,
        include_archived: bool,
    ) -> CoreResult<Vec<Workspace>>;

    async fn update_workspace(
        &self,
        workspace_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        visibility: Option<crate::domain::WorkspaceVisibility>,
    ) -> CoreResult<bool>;

    /// Sets `archived_at` and soft-deletes the workspace's documents.
    /// Idempotent: archiving an archived workspace reports success.
    async fn archive_workspace(&self, workspace_id: Uuid) -> CoreResult<bool>;
}

#[async_trait]
pub trait AclRepository: Send + Sync {
    /// User ids granted access, ordered `created_at ASC, user_id ASC`.
    async fn list_workspace_acl(&self, workspace_id: Uuid) -> CoreResult<Vec<Uuid>>;

    async fn list_workspace_acl_entries(&self, workspace_id: Uuid) -> CoreResult<Vec<AclEntry>>;

    /// Canonical share operation: delete + bulk upsert in one transaction.
    async fn replace_workspace_acl(
        &self,
        workspace_id: Uuid,
        entries: &[(Uuid, AclRole)],
        granted_by: Option<Uuid>,
    ) -> CoreResult<()>;

    async fn grant_acl(&self, entry: &AclEntry) -> CoreResult<()>;

    async fn revoke_acl(&self, workspace_id: Uuid, user_id: Uuid) -> CoreResult<bool>;

    /// Workspaces reachable by `user_id` through ACL entries.
    async fn list_workspaces_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Uuid>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn save_document(&self, document: &Document) -> CoreResult<()>;

    /// Atomic: the document row and its chunks land together or not at all.
    async fn save_document_with_chunks(
        &self,
        document: &Document,
        chunks: &[Chunk],
    ) -> CoreResult<()>;

    /// Verifies the document belongs to `workspace_id` before inserting.
    async fn save_chunks(
        &self,
        document_id: Uuid,
        chunks: &[Chunk],
        workspace_id: Uuid,
    ) -> CoreResult<()>;

    async fn delete_chunks_for_document(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
    ) -> CoreResult<u64>;

    async fn count_chunks_for_document(&self, document_id: Uuid) -> CoreResult<u64>;

    async fn get_document(&self, document_id: Uuid) -> CoreResult<Option<Document>>;

    async fn get_document_in_workspace(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
    ) -> CoreResult<Option<Document>>;

    async fn list_documents(
        &self,
        workspace_id: Uuid,
        sort: DocumentSort,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<Document>>;

    async fn update_document_file_metadata<'a>(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
        file_name: Option<&'a str>,
        mime_type: Option<&'a str>,
        storage_key: Option<&'a str>,
        uploaded_by_user_id: Option<Uuid>,
        status: Option<DocumentStatus>,
        error_message: Option<&'a str>,
    ) -> CoreResult<bool>;

    /// Single compare-and-set primitive for every state-machine move.
    /// Returns whether any row changed.
    async fn transition_document_status<'a>(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
        from: StatusSet,
        to: DocumentStatus,
        error_message: Option<&'a str>,
    ) -> CoreResult<bool>;

    async fn soft_delete_document(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
    ) -> CoreResult<bool>;

    /// Documents currently in `status` across all workspaces, oldest first.
    /// Used by the worker's startup sweep over PENDING documents.
    async fn find_documents_in_status(
        &self,
        status: DocumentStatus,
        limit: i64,
    ) -> CoreResult<Vec<Document>>;

    /// Cosine top-k scoped to the workspace; soft-deleted documents are
    /// filtered at the data layer. Descending similarity, attached.
    async fn find_similar_chunks(
        &self,
        embedding: &[f32],
        top_k: usize,
        workspace_id: Uuid,
    ) -> CoreResult<Vec<Chunk>>;

    async fn find_similar_chunks_mmr(
        &self,
        embedding: &[f32],
        top_k: usize,
        fetch_k: usize,
        lambda_mult: f32,
        workspace_id: Uuid,
    ) -> CoreResult<Vec<Chunk>>;
}
