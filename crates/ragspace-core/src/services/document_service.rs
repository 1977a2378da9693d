//! Document operations exposed to the API layer: listing, lookup, soft
//! delete, download URLs, reprocessing, status, and admin cancellation.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::domain::status::{truncate_error, FINISH_FROM};
use crate::domain::{Actor, Document, DocumentStatus, UserRole};
use crate::error::{CoreError, CoreResult};
use crate::ingestion::requeue_for_processing;
use crate::ports::repositories::DocumentSort;
use crate::ports::{
    AclRepository, DocumentRepository, FileStorage, JobQueue, WorkspaceRepository,
};

use super::workspace_access::{resolve_workspace_for_read, resolve_workspace_for_write};

const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct DocumentStatusView {
    pub document_id: Uuid,
    pub status: Option<DocumentStatus>,
    pub error_message: Option<String>,
    pub chunk_count: u64,
}

pub struct DocumentService {
    documents: Arc<dyn DocumentRepository>,
    workspaces: Arc<dyn WorkspaceRepository>,
    acl: Arc<dyn AclRepository>,
    storage: Option<Arc<dyn FileStorage>>,
    queue: Option<Arc<dyn JobQueue>>,
}

impl DocumentService {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
        acl: Arc<dyn AclRepository>,
        storage: Option<Arc<dyn FileStorage>>,
        queue: Option<Arc<dyn JobQueue>>,
    ) -> Self {
        Self {
            documents,
            workspaces,
            acl,
            storage,
            queue,
        }
    }

    async fn load_scoped(
        &self,
        workspace_id: Uuid,
        document_id: Uuid,
    ) -> CoreResult<Document> {
        self.documents
            .get_document_in_workspace(document_id, workspace_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Document", document_id.to_string()))
    }

    pub async fn list(
        &self,
        actor: &Actor,
        workspace_id: Uuid,
        sort: DocumentSort,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<Document>> {
        resolve_workspace_for_read(&self.workspaces, &self.acl, workspace_id, Some(actor)).await?;
        let limit = limit.clamp(1, 200);
        self.documents
            .list_documents(workspace_id, sort, limit, offset.max(0))
            .await
    }

    pub async fn get(
        &self,
        actor: &Actor,
        workspace_id: Uuid,
        document_id: Uuid,
    ) -> CoreResult<Document> {
        resolve_workspace_for_read(&self.workspaces, &self.acl, workspace_id, Some(actor)).await?;
        self.load_scoped(workspace_id, document_id).await
    }

    /// Soft delete: the row stays, listings and retrieval stop seeing it.
    pub async fn delete(
        &self,
        actor: &Actor,
        workspace_id: Uuid,
        document_id: Uuid,
    ) -> CoreResult<()> {
        resolve_workspace_for_write(&self.workspaces, workspace_id, Some(actor)).await?;
        let deleted = self
            .documents
            .soft_delete_document(document_id, workspace_id)
            .await?;
        if !deleted {
            return Err(CoreError::not_found("Document", document_id.to_string()));
        }
        info!(%document_id, "document soft-deleted");
        Ok(())
    }

    pub async fn download_url(
        &self,
        actor: &Actor,
        workspace_id: Uuid,
        document_id: Uuid,
    ) -> CoreResult<String> {
        resolve_workspace_for_read(&self.workspaces, &self.acl, workspace_id, Some(actor)).await?;
        let document = self.load_scoped(workspace_id, document_id).await?;

        let storage = self.storage.as_ref().ok_or_else(|| {
            CoreError::service_unavailable("FileStorage", "File storage unavailable.")
        })?;
        let storage_key = document
            .storage_key
            .as_deref()
            .ok_or_else(|| CoreError::validation("Document has no stored file"))?;
        let download_name = document.file_name.as_deref().unwrap_or("document");

        storage
            .presigned_url(storage_key, DOWNLOAD_URL_TTL, download_name)
            .await
    }

    pub async fn status(
        &self,
        actor: &Actor,
        workspace_id: Uuid,
        document_id: Uuid,
    ) -> CoreResult<DocumentStatusView> {
        resolve_workspace_for_read(&self.workspaces, &self.acl, workspace_id, Some(actor)).await?;
        let document = self.load_scoped(workspace_id, document_id).await?;
        let chunk_count = self.documents.count_chunks_for_document(document_id).await?;

        Ok(DocumentStatusView {
            document_id,
            status: document.status,
            error_message: document.error_message,
            chunk_count,
        })
    }

    /// Reprocess: CAS back to PENDING and enqueue a fresh job. Requires a
    /// stored file.
    pub async fn reprocess(
        &self,
        actor: &Actor,
        workspace_id: Uuid,
        document_id: Uuid,
    ) -> CoreResult<()> {
        resolve_workspace_for_write(&self.workspaces, workspace_id, Some(actor)).await?;
        let document = self.load_scoped(workspace_id, document_id).await?;

        if document.storage_key.is_none() {
            return Err(CoreError::validation(
                "Document has no stored file to reprocess",
            ));
        }

        let queue = self.queue.as_ref().ok_or_else(|| {
            CoreError::service_unavailable(
                "DocumentProcessingQueue",
                "Document queue unavailable.",
            )
        })?;

        requeue_for_processing(&self.documents, queue, document_id, workspace_id).await?;
        info!(%document_id, "document re-enqueued for processing");
        Ok(())
    }

    /// Admin-only escape hatch for a stuck PROCESSING document.
    pub async fn cancel_processing(
        &self,
        actor: &Actor,
        workspace_id: Uuid,
        document_id: Uuid,
    ) -> CoreResult<()> {
        if actor.role != Some(UserRole::Admin) {
            return Err(CoreError::forbidden(
                "Only admins can cancel document processing",
            ));
        }

        let actor_id = actor
            .user_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let message = truncate_error(&format!("Processing cancelled by admin {actor_id}"));

        let cancelled = self
            .documents
            .transition_document_status(
                document_id,
                workspace_id,
                FINISH_FROM,
                DocumentStatus::Failed,
                Some(&message),
            )
            .await?;

        if !cancelled {
            return Err(CoreError::conflict(format!(
                "Document {document_id} is not PROCESSING"
            )));
        }
        info!(%document_id, "processing cancelled by admin");
        Ok(())
    }
}
