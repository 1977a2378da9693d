use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreResult;

/// Body of a document-processing job. Delivery is at-least-once; the
/// state machine makes processing idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub document_id: Uuid,
    pub workspace_id: Uuid,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a processing job and return its queue-assigned id.
    async fn enqueue_document_processing(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
    ) -> CoreResult<String>;
}
