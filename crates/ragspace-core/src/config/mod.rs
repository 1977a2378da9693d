mod settings;

pub use settings::{
    CacheBackend, CacheConfig, ChunkerMode, DatabaseConfig, EmbeddingConfig, LlmConfig,
    PromptsConfig, RagConfig, RetryConfig, ServerConfig, Settings, StorageConfig,
};
