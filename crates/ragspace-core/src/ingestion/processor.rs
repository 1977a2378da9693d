//! Process-document job body: download, extract, chunk, embed, replace
//! chunks, and drive the status machine. Idempotent under at-least-once
//! delivery: a claim that fails means another worker owns the document.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::document::{DocumentTextExtractor, TextChunker};
use crate::domain::status::{truncate_error, CLAIM_FROM, FINISH_FROM};
use crate::domain::{Chunk, Document, DocumentStatus};
use crate::error::{CoreError, CoreResult};
use crate::ports::queue::ProcessingJob;
use crate::ports::{DocumentRepository, FileStorage};
use crate::retry::RetryPolicy;
use crate::services::embedding_cache::CachingEmbedder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Processed to completion; chunks replaced.
    Ready { chunks_created: usize },
    /// Already READY or PROCESSING; nothing to do.
    Noop { status: DocumentStatus },
    /// Could not claim the document (another worker, or incompatible state).
    Invalid,
    /// Document does not exist in the job's workspace.
    Missing,
    /// Processing failed; document parked as FAILED with a message.
    Failed { error_message: String },
}

/// Persisted failure text: the bare message for contract errors, the full
/// display (with error id) for infrastructure ones.
fn failure_message(error: &CoreError) -> String {
    match error {
        CoreError::Validation(message) => message.clone(),
        other => other.to_string(),
    }
}

pub struct ProcessDocumentUseCase {
    documents: Arc<dyn DocumentRepository>,
    storage: Option<Arc<dyn FileStorage>>,
    chunker: TextChunker,
    embedder: Arc<CachingEmbedder>,
    retry: RetryPolicy,
}

impl ProcessDocumentUseCase {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        storage: Option<Arc<dyn FileStorage>>,
        chunker: TextChunker,
        embedder: Arc<CachingEmbedder>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            documents,
            storage,
            chunker,
            embedder,
            retry,
        }
    }

    pub async fn execute(&self, job: &ProcessingJob) -> CoreResult<ProcessOutcome> {
        let started = Instant::now();
        let document_id = job.document_id;
        let workspace_id = job.workspace_id;

        let Some(document) = self
            .documents
            .get_document_in_workspace(document_id, workspace_id)
            .await?
        else {
            warn!(%document_id, %workspace_id, "process job for missing document");
            return Ok(ProcessOutcome::Missing);
        };

        // Already done or owned by another worker.
        if let Some(status @ (DocumentStatus::Ready | DocumentStatus::Processing)) =
            document.status
        {
            return Ok(ProcessOutcome::Noop { status });
        }

        let claimed = self
            .documents
            .transition_document_status(
                document_id,
                workspace_id,
                CLAIM_FROM,
                DocumentStatus::Processing,
                None,
            )
            .await?;
        if !claimed {
            return Ok(ProcessOutcome::Invalid);
        }

        match self.process_claimed(&document).await {
            Ok(chunks_created) => {
                self.documents
                    .transition_document_status(
                        document_id,
                        workspace_id,
                        FINISH_FROM,
                        DocumentStatus::Ready,
                        None,
                    )
                    .await?;

                info!(
                    %document_id,
                    chunks_created,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "document processed"
                );
                Ok(ProcessOutcome::Ready { chunks_created })
            }
            Err(error) => {
                let error_message = truncate_error(&failure_message(&error));
                // A document must never stay PROCESSING after a failure.
                self.documents
                    .transition_document_status(
                        document_id,
                        workspace_id,
                        FINISH_FROM,
                        DocumentStatus::Failed,
                        Some(&error_message),
                    )
                    .await?;

                warn!(
                    %document_id,
                    error = %error,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "document processing failed"
                );
                Ok(ProcessOutcome::Failed { error_message })
            }
        }
    }

    async fn process_claimed(&self, document: &Document) -> CoreResult<usize> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| CoreError::service_unavailable("FileStorage", "not configured"))?;

        let (storage_key, mime_type) = match (&document.storage_key, &document.mime_type) {
            (Some(key), Some(mime)) => (key.clone(), mime.clone()),
            _ => {
                return Err(CoreError::validation(
                    "Missing file metadata for processing",
                ))
            }
        };

        let bytes = storage.download(&storage_key).await?;
        let text = DocumentTextExtractor::extract_text(&mime_type, &bytes)?;
        let fragments = self.chunker.chunk(&text);

        let embeddings = if fragments.is_empty() {
            Vec::new()
        } else {
            self.retry
                .run("embed_batch", || self.embedder.embed_batch(&fragments))
                .await?
        };

        // Replace, never merge: delete the old set, then insert the new one,
        // with READY strictly after both.
        self.documents
            .delete_chunks_for_document(document.id, document.workspace_id)
            .await?;

        if fragments.is_empty() {
            warn!(document_id = %document.id, "document produced no chunks");
            return Ok(0);
        }

        let chunks: Vec<Chunk> = fragments
            .into_iter()
            .zip(embeddings.into_iter())
            .enumerate()
            .map(|(index, (content, embedding))| {
                Chunk::new(document.id, index as i32, content, embedding)
            })
            .collect();

        self.documents
            .save_chunks(document.id, &chunks, document.workspace_id)
            .await?;

        Ok(chunks.len())
    }
}

/// Reprocess entry point: CAS back to PENDING, then enqueue.
pub async fn requeue_for_processing(
    documents: &Arc<dyn DocumentRepository>,
    queue: &Arc<dyn crate::ports::JobQueue>,
    document_id: Uuid,
    workspace_id: Uuid,
) -> CoreResult<()> {
    let transitioned = documents
        .transition_document_status(
            document_id,
            workspace_id,
            crate::domain::status::ENQUEUE_FROM,
            DocumentStatus::Pending,
            None,
        )
        .await?;

    if !transitioned {
        return Err(CoreError::conflict(format!(
            "Document {document_id} cannot be re-enqueued from its current status"
        )));
    }

    queue
        .enqueue_document_processing(document_id, workspace_id)
        .await?;
    Ok(())
}
