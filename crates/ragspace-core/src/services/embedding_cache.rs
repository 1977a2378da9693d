//! Cache-aware decoration of an embedding provider.
//!
//! Key shape: `model_id|task_type|norm_version|normalized_text`. Batch calls
//! are deduplicated by key preserving first-appearance order; the provider is
//! called once with the unique misses and results fan out to every original
//! index. Cache failures are logged and treated as misses, never surfaced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::ports::{EmbeddingCachePort, EmbeddingProvider};

const TEXT_NORMALIZATION_VERSION: &str = "v1";
const TASK_QUERY: &str = "retrieval_query";
const TASK_DOCUMENT: &str = "retrieval_document";

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Whitespace-only normalization for stable cache keys.
pub fn normalize_embedding_text(text: &str) -> String {
    whitespace_re().replace_all(text.trim(), " ").into_owned()
}

pub fn build_embedding_cache_key(model_id: &str, text: &str, task_type: &str) -> String {
    let normalized = normalize_embedding_text(text);
    format!("{model_id}|{task_type}|{TEXT_NORMALIZATION_VERSION}|{normalized}")
}

#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCounters {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn record_hits(&self, count: u64) {
        self.hits.fetch_add(count, Ordering::Relaxed);
    }

    fn record_misses(&self, count: u64) {
        self.misses.fetch_add(count, Ordering::Relaxed);
    }
}

pub struct CachingEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<dyn EmbeddingCachePort>,
    counters: CacheCounters,
}

impl CachingEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: Arc<dyn EmbeddingCachePort>) -> Self {
        Self {
            provider,
            cache,
            counters: CacheCounters::default(),
        }
    }

    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    async fn cache_get(&self, key: &str) -> Option<Vec<f32>> {
        match self.cache.get(key).await {
            Ok(value) => value,
            Err(error) => {
                warn!(error = %error, "embedding cache read failed, treating as miss");
                None
            }
        }
    }

    async fn cache_set(&self, key: &str, embedding: &[f32]) {
        if let Err(error) = self.cache.set(key, embedding).await {
            warn!(error = %error, "embedding cache write failed");
        }
    }

    /// Single-query path: lookup, on miss call the provider and store.
    pub async fn embed_query(&self, query: &str) -> CoreResult<Vec<f32>> {
        let key = build_embedding_cache_key(self.provider.model_id(), query, TASK_QUERY);

        if let Some(embedding) = self.cache_get(&key).await {
            self.counters.record_hits(1);
            debug!(kind = "query", "embedding cache hit");
            return Ok(embedding);
        }

        self.counters.record_misses(1);
        let embedding = self.provider.embed_query(query).await?;
        self.cache_set(&key, &embedding).await;
        Ok(embedding)
    }

    /// Batch path: the result list is 1:1 with the input, no holes.
    /// Duplicated texts hit the provider at most once.
    pub async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Dedupe by key, preserving first-appearance order of the misses.
        let mut key_to_indices: HashMap<String, Vec<usize>> = HashMap::new();
        let mut ordered_keys: Vec<String> = Vec::new();
        for (idx, text) in texts.iter().enumerate() {
            let key = build_embedding_cache_key(self.provider.model_id(), text, TASK_DOCUMENT);
            let entry = key_to_indices.entry(key.clone()).or_default();
            if entry.is_empty() {
                ordered_keys.push(key);
            }
            entry.push(idx);
        }

        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut miss_keys: Vec<String> = Vec::new();
        let mut miss_texts: Vec<String> = Vec::new();

        for key in &ordered_keys {
            let indices = &key_to_indices[key];
            match self.cache_get(key).await {
                Some(embedding) => {
                    self.counters.record_hits(indices.len() as u64);
                    for &idx in indices {
                        results[idx] = Some(embedding.clone());
                    }
                }
                None => {
                    self.counters.record_misses(indices.len() as u64);
                    miss_keys.push(key.clone());
                    miss_texts.push(texts[indices[0]].clone());
                }
            }
        }

        if !miss_texts.is_empty() {
            let embeddings = self.provider.embed_batch(&miss_texts).await?;
            if embeddings.len() != miss_texts.len() {
                return Err(CoreError::embedding(format!(
                    "Embedding batch size mismatch: expected {}, got {}",
                    miss_texts.len(),
                    embeddings.len()
                )));
            }

            for (key, embedding) in miss_keys.iter().zip(embeddings.into_iter()) {
                self.cache_set(key, &embedding).await;
                for &idx in &key_to_indices[key] {
                    results[idx] = Some(embedding.clone());
                }
            }
        }

        let mut out: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        for (idx, slot) in results.into_iter().enumerate() {
            match slot {
                Some(embedding) => out.push(embedding),
                None => {
                    return Err(CoreError::embedding(format!(
                        "Embedding cache failed to resolve batch index {idx}"
                    )))
                }
            }
        }
        Ok(out)
    }
}
