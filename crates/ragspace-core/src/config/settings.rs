use anyhow::{bail, Result};
use config::{Config, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub rag: RagConfig,
    pub prompts: PromptsConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    pub api_key: Option<String>,
    /// Deterministic local vectors instead of a provider call.
    #[serde(default)]
    pub fake_embeddings: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    pub api_key: Option<String>,
    /// Echo-style answers instead of a provider call.
    #[serde(default)]
    pub fake_llm: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkerMode {
    Simple,
    Structured,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RagConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_chunker_mode")]
    pub text_chunker_mode: ChunkerMode,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default = "default_max_conversation_messages")]
    pub max_conversation_messages: usize,
    #[serde(default)]
    pub default_use_mmr: bool,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptsConfig {
    pub dir: String,
    #[serde(default = "default_prompt_version")]
    pub prompt_version: String,
    #[serde(default = "default_policy_file")]
    pub policy_file: String,
    #[serde(default = "default_lang")]
    pub lang: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub root_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub embedding_cache_backend: CacheBackend,
    pub redis_url: Option<String>,
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_seconds: f64,
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_seconds: f64,
}

fn default_pool_max_size() -> u32 {
    10
}
fn default_statement_timeout() -> u64 {
    30
}
fn default_dimension() -> usize {
    crate::domain::EMBEDDING_DIMENSION
}
fn default_llm_timeout() -> u64 {
    60
}
fn default_max_tokens() -> usize {
    1024
}
fn default_chunk_size() -> usize {
    900
}
fn default_chunk_overlap() -> usize {
    120
}
fn default_chunker_mode() -> ChunkerMode {
    ChunkerMode::Simple
}
fn default_max_context_chars() -> usize {
    12_000
}
fn default_max_top_k() -> usize {
    20
}
fn default_max_conversation_messages() -> usize {
    12
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_prompt_version() -> String {
    "v2".to_string()
}
fn default_policy_file() -> String {
    "secure_contract_es.md".to_string()
}
fn default_lang() -> String {
    "es".to_string()
}
fn default_cache_backend() -> CacheBackend {
    CacheBackend::Memory
}
fn default_cache_ttl() -> u64 {
    3600
}
fn default_cache_capacity() -> usize {
    10_000
}
fn default_retry_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay() -> f64 {
    1.0
}
fn default_retry_max_delay() -> f64 {
    30.0
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Cross-field validation, fail-fast at startup.
    pub fn validate(&self) -> Result<()> {
        if self.rag.chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            bail!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.rag.chunk_overlap,
                self.rag.chunk_size
            );
        }
        let version_re = Regex::new(r"^v\d+$").expect("static regex");
        if !version_re.is_match(&self.prompts.prompt_version) {
            bail!(
                "prompt_version '{}' must match v1, v2, ...",
                self.prompts.prompt_version
            );
        }
        if self.cache.embedding_cache_backend == CacheBackend::Redis
            && self.cache.redis_url.is_none()
        {
            bail!("embedding_cache_backend = redis requires cache.redis_url");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> Settings {
        Settings {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/ragspace".into(),
                pool_max_size: default_pool_max_size(),
                statement_timeout_seconds: default_statement_timeout(),
            },
            embedding: EmbeddingConfig {
                base_url: "http://localhost:8081".into(),
                model: "embed-test".into(),
                dimension: default_dimension(),
                api_key: None,
                fake_embeddings: true,
            },
            llm: LlmConfig {
                base_url: "http://localhost:8082".into(),
                model: "llm-test".into(),
                timeout_seconds: default_llm_timeout(),
                max_tokens: default_max_tokens(),
                api_key: None,
                fake_llm: true,
            },
            rag: RagConfig {
                chunk_size: default_chunk_size(),
                chunk_overlap: default_chunk_overlap(),
                text_chunker_mode: ChunkerMode::Simple,
                max_context_chars: default_max_context_chars(),
                max_top_k: default_max_top_k(),
                max_conversation_messages: default_max_conversation_messages(),
                default_use_mmr: false,
                max_upload_bytes: default_max_upload_bytes(),
            },
            prompts: PromptsConfig {
                dir: "prompts".into(),
                prompt_version: default_prompt_version(),
                policy_file: default_policy_file(),
                lang: default_lang(),
            },
            storage: StorageConfig {
                root_dir: "/tmp/ragspace".into(),
            },
            cache: CacheConfig {
                embedding_cache_backend: CacheBackend::Memory,
                redis_url: None,
                ttl_seconds: default_cache_ttl(),
                capacity: default_cache_capacity(),
            },
            retry: RetryConfig {
                retry_max_attempts: default_retry_max_attempts(),
                retry_base_delay_seconds: default_retry_base_delay(),
                retry_max_delay_seconds: default_retry_max_delay(),
            },
        }
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let mut settings = base_settings();
        settings.rag.chunk_overlap = settings.rag.chunk_size;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn prompt_version_pattern_is_enforced() {
        let mut settings = base_settings();
        settings.prompts.prompt_version = "latest".into();
        assert!(settings.validate().is_err());

        settings.prompts.prompt_version = "v12".into();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn redis_backend_requires_url() {
        let mut settings = base_settings();
        settings.cache.embedding_cache_backend = CacheBackend::Redis;
        assert!(settings.validate().is_err());
        settings.cache.redis_url = Some("redis://localhost:6379".into());
        assert!(settings.validate().is_ok());
    }
}
