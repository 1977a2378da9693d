//! Filesystem-backed object store for single-node deployments. Keys are
//! opaque slash-separated paths under a configured root.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::ports::FileStorage;

pub struct FsFileStorage {
    root: PathBuf,
}

impl FsFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reject traversal; keys must stay strictly under the root.
    fn resolve(&self, key: &str) -> CoreResult<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
            return Err(CoreError::validation(format!("Invalid storage key: {key}")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl FileStorage for FsFileStorage {
    async fn upload(&self, key: &str, bytes: &[u8], _mime_type: &str) -> CoreResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CoreError::service_unavailable("FileStorage", format!("mkdir failed: {e}"))
            })?;
        }
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            CoreError::service_unavailable("FileStorage", format!("write failed: {e}"))
        })?;
        debug!(key, bytes = bytes.len(), "stored object");
        Ok(())
    }

    async fn download(&self, key: &str) -> CoreResult<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::not_found("StoredObject", key.to_string())
            } else {
                CoreError::service_unavailable("FileStorage", format!("read failed: {e}"))
            }
        })
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::service_unavailable(
                "FileStorage",
                format!("delete failed: {e}"),
            )),
        }
    }

    async fn presigned_url(
        &self,
        key: &str,
        ttl: Duration,
        download_name: &str,
    ) -> CoreResult<String> {
        let path = self.resolve(key)?;
        if !Path::new(&path).exists() {
            return Err(CoreError::not_found("StoredObject", key.to_string()));
        }
        // No real signing on the filesystem backend; the URL encodes intent.
        Ok(format!(
            "file://{}?expires_in={}&filename={}",
            path.display(),
            ttl.as_secs(),
            download_name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn upload_download_delete_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = FsFileStorage::new(dir.path());

        storage
            .upload("documents/abc/report.txt", b"payload", "text/plain")
            .await
            .unwrap();
        let bytes = storage.download("documents/abc/report.txt").await.unwrap();
        assert_eq!(bytes, b"payload");

        storage.delete("documents/abc/report.txt").await.unwrap();
        let err = storage.download("documents/abc/report.txt").await.unwrap_err();
        assert_eq!(err.kind(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let storage = FsFileStorage::new(dir.path());
        storage.delete("documents/never/was.txt").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = FsFileStorage::new(dir.path());

        let err = storage.download("../etc/passwd").await.unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
        let err = storage.download("/abs/path").await.unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
    }
}
