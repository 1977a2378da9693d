//! Embedding cache backends: in-process LRU with TTL, and a Redis-backed
//! variant selectable by configuration. Callers go through the caching
//! facade, which treats any backend failure as a miss.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::AsyncCommands;

use crate::config::CacheConfig;
use crate::error::{CoreError, CoreResult};
use crate::ports::EmbeddingCachePort;

struct CacheEntry {
    embedding: Vec<f32>,
    inserted_at: Instant,
    last_used: u64,
}

struct LruState {
    entries: HashMap<String, CacheEntry>,
    tick: u64,
}

pub struct InMemoryEmbeddingCache {
    state: Mutex<LruState>,
    capacity: usize,
    ttl: Duration,
}

impl InMemoryEmbeddingCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(LruState {
                entries: HashMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, Duration::from_secs(config.ttl_seconds))
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EmbeddingCachePort for InMemoryEmbeddingCache {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<f32>>> {
        let mut state = self.state.lock();
        state.tick += 1;
        let tick = state.tick;

        let expired = match state.entries.get_mut(key) {
            Some(entry) if entry.inserted_at.elapsed() > self.ttl => true,
            Some(entry) => {
                entry.last_used = tick;
                return Ok(Some(entry.embedding.clone()));
            }
            None => return Ok(None),
        };

        if expired {
            state.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, embedding: &[f32]) -> CoreResult<()> {
        let mut state = self.state.lock();
        state.tick += 1;
        let tick = state.tick;

        if state.entries.len() >= self.capacity && !state.entries.contains_key(key) {
            // Evict the least recently used entry.
            if let Some(lru_key) = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone())
            {
                state.entries.remove(&lru_key);
            }
        }

        state.entries.insert(
            key.to_string(),
            CacheEntry {
                embedding: embedding.to_vec(),
                inserted_at: Instant::now(),
                last_used: tick,
            },
        );
        Ok(())
    }
}

/// Redis-backed cache; values are JSON-encoded vectors with a TTL.
pub struct RedisEmbeddingCache {
    manager: redis::aio::ConnectionManager,
    ttl_seconds: u64,
    key_prefix: String,
}

impl RedisEmbeddingCache {
    pub async fn connect(url: &str, ttl_seconds: u64) -> CoreResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CoreError::service_unavailable("EmbeddingCache", e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CoreError::service_unavailable("EmbeddingCache", e.to_string()))?;
        Ok(Self {
            manager,
            ttl_seconds,
            key_prefix: "emb:".to_string(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl EmbeddingCachePort for RedisEmbeddingCache {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<f32>>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn
            .get(self.full_key(key))
            .await
            .map_err(|e| CoreError::service_unavailable("EmbeddingCache", e.to_string()))?;

        match raw {
            Some(json) => {
                let embedding: Vec<f32> = serde_json::from_str(&json).map_err(|e| {
                    CoreError::service_unavailable("EmbeddingCache", e.to_string())
                })?;
                Ok(Some(embedding))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, embedding: &[f32]) -> CoreResult<()> {
        let json = serde_json::to_string(embedding)
            .map_err(|e| CoreError::service_unavailable("EmbeddingCache", e.to_string()))?;
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(self.full_key(key), json, self.ttl_seconds)
            .await
            .map_err(|e| CoreError::service_unavailable("EmbeddingCache", e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_after_set_round_trips() {
        let cache = InMemoryEmbeddingCache::new(10, Duration::from_secs(60));
        cache.set("k", &[1.0, 2.0]).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(vec![1.0, 2.0]));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let cache = InMemoryEmbeddingCache::new(10, Duration::from_millis(0));
        cache.set("k", &[1.0]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let cache = InMemoryEmbeddingCache::new(2, Duration::from_secs(60));
        cache.set("a", &[1.0]).await.unwrap();
        cache.set("b", &[2.0]).await.unwrap();

        // Touch "a" so "b" is the LRU entry.
        cache.get("a").await.unwrap();
        cache.set("c", &[3.0]).await.unwrap();

        assert!(cache.get("a").await.unwrap().is_some());
        assert!(cache.get("b").await.unwrap().is_none());
        assert!(cache.get("c").await.unwrap().is_some());
    }
}
