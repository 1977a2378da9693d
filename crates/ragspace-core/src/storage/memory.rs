//! In-memory object store used by tests and single-process demos.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{CoreError, CoreResult};
use crate::ports::FileStorage;

#[derive(Default)]
pub struct InMemoryFileStorage {
    objects: DashMap<String, (Vec<u8>, String)>,
}

impl InMemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl FileStorage for InMemoryFileStorage {
    async fn upload(&self, key: &str, bytes: &[u8], mime_type: &str) -> CoreResult<()> {
        self.objects
            .insert(key.to_string(), (bytes.to_vec(), mime_type.to_string()));
        Ok(())
    }

    async fn download(&self, key: &str) -> CoreResult<Vec<u8>> {
        self.objects
            .get(key)
            .map(|entry| entry.0.clone())
            .ok_or_else(|| CoreError::not_found("StoredObject", key.to_string()))
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.objects.remove(key);
        Ok(())
    }

    async fn presigned_url(
        &self,
        key: &str,
        ttl: Duration,
        download_name: &str,
    ) -> CoreResult<String> {
        if !self.objects.contains_key(key) {
            return Err(CoreError::not_found("StoredObject", key.to_string()));
        }
        Ok(format!(
            "memory://{key}?expires_in={}&filename={download_name}",
            ttl.as_secs()
        ))
    }
}
