use std::sync::Arc;

use ragspace_core::database::DbPool;
use ragspace_core::ingestion::UploadDocumentUseCase;
use ragspace_core::services::{
    AnswerUseCase, ConversationStore, DocumentService, WorkspaceService,
};

pub struct AppState {
    pub db: Option<DbPool>,
    pub workspaces: WorkspaceService,
    pub documents: DocumentService,
    pub upload: UploadDocumentUseCase,
    pub answer: AnswerUseCase,
    pub conversations: Arc<ConversationStore>,
}
