//! Interface boundaries to external collaborator services.
//!
//! Image acquisition, image extraction and the key/value metadata caches are
//! separate systems. The registry consumes them behind these contracts and
//! never looks inside; request/response shapes are the whole agreement.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registry-side image acquisition: authentication plus metadata lookups
/// against a remote image registry.
#[async_trait]
pub trait ImagePuller: Send + Sync {
    async fn authenticate(&self, repo: &str, scope: &str) -> Result<String, ServiceError>;

    async fn pull_manifest(
        &self,
        repo: &str,
        tag: &str,
        token: &str,
    ) -> Result<Vec<u8>, ServiceError>;

    async fn list_tags(&self, repo: &str, token: &str) -> Result<Vec<String>, ServiceError>;
}

/// Unpacks an image into a sandbox root.
#[async_trait]
pub trait ImageExtractor: Send + Sync {
    async fn extract(&self, image: &Path, dest: &Path) -> Result<(), ServiceError>;
}

/// Three-method key/value contract shared by the file-backed and the
/// networked metadata caches.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), ServiceError>;

    async fn delete(&self, key: &str) -> Result<(), ServiceError>;
}

/// In-process stand-in used when no external cache is wired up.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Extractor for images that are already an unpacked rootfs tree on local
/// disk: copies the tree into the sandbox root, preserving permissions.
/// Archive and segmented-image formats are the real extraction service's
/// business.
#[derive(Debug, Default)]
pub struct DirExtractor;

#[async_trait]
impl ImageExtractor for DirExtractor {
    async fn extract(&self, image: &Path, dest: &Path) -> Result<(), ServiceError> {
        if !image.is_dir() {
            return Err(ServiceError::Unavailable(format!(
                "image tree not found: {}",
                image.display()
            )));
        }
        copy_tree(image.to_path_buf(), dest.to_path_buf()).await
    }
}

async fn copy_tree(src: PathBuf, dest: PathBuf) -> Result<(), ServiceError> {
    let mut stack = vec![(src, dest)];

    while let Some((from, to)) = stack.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = to.join(entry.file_name());
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push((entry.path(), target));
            } else if file_type.is_file() {
                tokio::fs::copy(entry.path(), &target).await?;
            }
            // Symlinks and special files are skipped here; the real
            // extraction service owns those.
        }
    }

    Ok(())
}
