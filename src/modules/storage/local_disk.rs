use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::BlobStore;
use crate::core::config::LocalStorageConfig;
use crate::core::error::{AppError, Result};

/// Writes blobs below a local directory; the router serves that directory at `/uploads`
pub struct LocalDiskStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskStore {
    pub fn new(config: &LocalStorageConfig) -> Self {
        Self {
            root: config.upload_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root_exists(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::Internal(format!(
                "Failed to create upload directory '{}': {}",
                self.root.display(),
                e
            ))
        })
    }

    /// Resolve a relative key inside the root, refusing anything that escapes it
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || key.is_empty() {
            return Err(AppError::Internal(format!("Invalid storage key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalDiskStore {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<String> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Internal(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(&path, data).await.map_err(|e| {
            AppError::Internal(format!("Failed to write '{}': {}", path.display(), e))
        })?;

        debug!("Stored upload at {}", path.display());
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn remove(&self, url: &str) -> Result<()> {
        let key = url
            .strip_prefix(&self.public_base_url)
            .map(|k| k.trim_start_matches('/'))
            .ok_or_else(|| AppError::Internal(format!("URL '{}' is not a local upload", url)))?;
        let path = self.resolve(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!(
                "Failed to remove '{}': {}",
                path.display(),
                e
            ))),
        }
    }
}
