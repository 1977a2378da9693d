//! Abstract interfaces the core depends on. Concrete adapters live either in
//! this crate (database, filesystem storage, in-memory queue and cache,
//! deterministic fakes) or in the binaries (HTTP providers).

pub mod cache;
pub mod embedding;
pub mod llm;
pub mod queue;
pub mod repositories;
pub mod storage;

pub use cache::EmbeddingCachePort;
pub use embedding::EmbeddingProvider;
pub use llm::{LlmProvider, TokenStream};
pub use queue::JobQueue;
pub use repositories::{AclRepository, DocumentRepository, WorkspaceRepository};
pub use storage::FileStorage;
