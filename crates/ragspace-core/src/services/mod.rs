pub mod answer;
pub mod cache;
pub mod context;
pub mod conversation;
pub mod document_service;
pub mod embedding_cache;
pub mod fake;
pub mod prompt;
pub mod retrieval;
pub mod workspace_access;
pub mod workspace_service;

pub use answer::{AnswerEvent, AnswerUseCase, AskAnswer, AskRequest, SourceRef};
pub use cache::{InMemoryEmbeddingCache, RedisEmbeddingCache};
pub use context::ContextBuilder;
pub use conversation::{format_conversation_query, ConversationStore};
pub use document_service::{DocumentService, DocumentStatusView};
pub use embedding_cache::{build_embedding_cache_key, normalize_embedding_text, CachingEmbedder};
pub use fake::{FakeEmbeddingProvider, FakeLlmProvider};
pub use prompt::{parse_frontmatter, PromptComposer, PromptMetadata};
pub use retrieval::{RetrievalPipeline, RetrievalRequest, RetrievalResult, NO_RESULTS_ANSWER};
pub use workspace_service::{CreateWorkspaceInput, WorkspaceService};
