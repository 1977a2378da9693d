//! Upload orchestration: store bytes, persist metadata, enqueue processing.
//! Each step has an explicit compensation path so a failure never leaves the
//! database pointing at a missing object.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::tags::{normalize_allowed_roles, normalize_tags};
use crate::domain::{Actor, Document, DocumentStatus};
use crate::error::{CoreError, CoreResult};
use crate::ports::{DocumentRepository, FileStorage, JobQueue, WorkspaceRepository};
use crate::services::workspace_access::resolve_workspace_for_write;

const MSG_STORAGE_UNAVAILABLE: &str = "File storage unavailable.";
const MSG_QUEUE_UNAVAILABLE: &str = "Document queue unavailable.";
const MSG_ENQUEUE_FAILED: &str = "Failed to enqueue document processing job";

#[derive(Debug, Clone)]
pub struct UploadDocumentInput {
    pub workspace_id: Uuid,
    pub actor: Actor,
    pub title: String,
    pub file_name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
    pub source: Option<String>,
    pub metadata: Option<Value>,
    pub uploaded_by_user_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UploadDocumentOutput {
    pub document_id: Uuid,
    pub status: DocumentStatus,
    pub file_name: String,
    pub mime_type: String,
}

pub struct UploadDocumentUseCase {
    documents: Arc<dyn DocumentRepository>,
    workspaces: Arc<dyn WorkspaceRepository>,
    storage: Option<Arc<dyn FileStorage>>,
    queue: Option<Arc<dyn JobQueue>>,
    max_upload_bytes: usize,
}

impl UploadDocumentUseCase {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
        storage: Option<Arc<dyn FileStorage>>,
        queue: Option<Arc<dyn JobQueue>>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            documents,
            workspaces,
            storage,
            queue,
            max_upload_bytes,
        }
    }

    /// Deterministic object key derived from the document id.
    fn build_storage_key(document_id: Uuid, file_name: &str) -> String {
        format!("documents/{document_id}/{file_name}")
    }

    /// Strip any path components a client smuggles into the file name.
    fn sanitize_file_name(file_name: &str) -> String {
        file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_name)
            .trim()
            .to_string()
    }

    pub async fn execute(&self, input: UploadDocumentInput) -> CoreResult<UploadDocumentOutput> {
        let file_name = Self::sanitize_file_name(&input.file_name);
        if file_name.is_empty() {
            return Err(CoreError::validation("file_name is required"));
        }
        if input.content.is_empty() {
            return Err(CoreError::validation("file content is empty"));
        }
        if input.content.len() > self.max_upload_bytes {
            return Err(CoreError::validation(format!(
                "file exceeds the {} byte upload limit",
                self.max_upload_bytes
            )));
        }

        // 1) Write access.
        resolve_workspace_for_write(&self.workspaces, input.workspace_id, Some(&input.actor))
            .await?;

        // 2) External dependencies must be present before any side effect.
        let storage = self.storage.as_ref().ok_or_else(|| {
            CoreError::service_unavailable("FileStorage", MSG_STORAGE_UNAVAILABLE)
        })?;
        let queue = self.queue.as_ref().ok_or_else(|| {
            CoreError::service_unavailable("DocumentProcessingQueue", MSG_QUEUE_UNAVAILABLE)
        })?;

        // 3) Ids and object key; the object goes in first so the database
        // never references a key that does not exist.
        let document_id = Uuid::new_v4();
        let storage_key = Self::build_storage_key(document_id, &file_name);

        storage
            .upload(&storage_key, &input.content, &input.mime_type)
            .await?;

        // 4) Persist the document row and its file metadata as PENDING.
        let metadata = input.metadata.unwrap_or_else(|| Value::Object(Default::default()));
        let mut document = Document::new(document_id, input.workspace_id, input.title.trim());
        document.source = input.source.clone();
        document.tags = normalize_tags(&metadata);
        document.allowed_roles = normalize_allowed_roles(&metadata);
        document.metadata = metadata;

        let persisted = async {
            self.documents.save_document(&document).await?;
            self.documents
                .update_document_file_metadata(
                    document_id,
                    input.workspace_id,
                    Some(&file_name),
                    Some(&input.mime_type),
                    Some(&storage_key),
                    input.uploaded_by_user_id,
                    Some(DocumentStatus::Pending),
                    None,
                )
                .await?;
            Ok::<(), CoreError>(())
        }
        .await;

        if let Err(db_error) = persisted {
            // Compensation: drop the orphaned object, best effort.
            if let Err(cleanup_error) = storage.delete(&storage_key).await {
                warn!(
                    %document_id,
                    error = %cleanup_error,
                    "failed to clean up orphaned object after db error"
                );
            }
            return Err(db_error);
        }

        // 5) Enqueue. On failure the object and row stay; the document is
        // parked as FAILED with a stable message and can be retried.
        if let Err(enqueue_error) = queue
            .enqueue_document_processing(document_id, input.workspace_id)
            .await
        {
            warn!(%document_id, error = %enqueue_error, "enqueue failed");
            self.documents
                .transition_document_status(
                    document_id,
                    input.workspace_id,
                    &[Some(DocumentStatus::Pending)],
                    DocumentStatus::Failed,
                    Some(MSG_ENQUEUE_FAILED),
                )
                .await
                .ok();
            return Err(CoreError::service_unavailable(
                "DocumentProcessingQueue",
                MSG_QUEUE_UNAVAILABLE,
            ));
        }

        info!(
            %document_id,
            workspace_id = %input.workspace_id,
            file_name = %file_name,
            "document uploaded and enqueued"
        );

        Ok(UploadDocumentOutput {
            document_id,
            status: DocumentStatus::Pending,
            file_name,
            mime_type: input.mime_type,
        })
    }
}
