//! Local directory-tree storage provider.

use super::{
    FileStorageProvider, ObjectMetadata, UploadResult, gunzip_bytes, gzip_bytes,
    validate_storage_path,
};
use crate::error::StorageError;
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Artifact storage rooted at a local directory
///
/// Object paths map directly onto the filesystem under the root. Compression
/// and the `.gz` suffix convention behave identically to the object-store
/// provider, so a deployment can switch providers without path churn.
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Create the provider, ensuring the root directory exists
    pub async fn new(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::Client {
                provider: "local",
                reason: format!("failed to create storage root '{}': {e}", root.display()),
            }
        })?;
        Ok(Self { root })
    }

    /// Root directory of this provider
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, storage_path: &str) -> Result<PathBuf> {
        validate_storage_path(storage_path)?;
        Ok(self.root.join(storage_path))
    }

    /// Resolve a path, preferring the exact object and falling back to `.gz`
    async fn resolve_existing(&self, storage_path: &str) -> Result<(PathBuf, bool)> {
        let plain = self.resolve(storage_path)?;
        if tokio::fs::metadata(&plain).await.is_ok() {
            return Ok((plain, storage_path.ends_with(".gz")));
        }
        let gz = self.resolve(&format!("{storage_path}.gz"))?;
        if tokio::fs::metadata(&gz).await.is_ok() {
            return Ok((gz, true));
        }
        Err(StorageError::ObjectNotFound {
            provider: "local",
            path: storage_path.to_string(),
        }
        .into())
    }
}

#[async_trait]
impl FileStorageProvider for LocalFileStorage {
    fn provider_name(&self) -> &'static str {
        "local"
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        destination_path: &str,
        compress: bool,
    ) -> Result<UploadResult> {
        validate_storage_path(destination_path)?;

        let data = tokio::fs::read(local_path).await.map_err(|e| {
            StorageError::UploadFailed {
                provider: "local",
                path: destination_path.to_string(),
                reason: format!("failed to read '{}': {e}", local_path.display()),
            }
        })?;
        let original_size = data.len() as u64;

        let (stored, final_path) = if compress {
            let compressed = tokio::task::spawn_blocking(move || gzip_bytes(&data))
                .await
                .map_err(|e| StorageError::UploadFailed {
                    provider: "local",
                    path: destination_path.to_string(),
                    reason: format!("compression task failed: {e}"),
                })??;
            (compressed, format!("{destination_path}.gz"))
        } else {
            (data, destination_path.to_string())
        };
        let stored_size = stored.len() as u64;

        let target = self.resolve(&final_path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::UploadFailed {
                    provider: "local",
                    path: final_path.clone(),
                    reason: format!("failed to create parent directory: {e}"),
                }
            })?;
        }
        tokio::fs::write(&target, stored).await.map_err(|e| {
            StorageError::UploadFailed {
                provider: "local",
                path: final_path.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(UploadResult {
            uri: format!("file://{}", target.display()),
            original_size,
            stored_size,
            compression_ratio: if original_size > 0 {
                stored_size as f64 / original_size as f64
            } else {
                1.0
            },
            compressed: compress,
        })
    }

    async fn download_file(
        &self,
        storage_path: &str,
        local_path: &Path,
        decompress: bool,
    ) -> Result<()> {
        let (source, compressed) = self.resolve_existing(storage_path).await?;

        let data = tokio::fs::read(&source).await.map_err(|e| {
            StorageError::DownloadFailed {
                provider: "local",
                path: storage_path.to_string(),
                reason: e.to_string(),
            }
        })?;

        let out = if decompress && compressed {
            tokio::task::spawn_blocking(move || gunzip_bytes(&data))
                .await
                .map_err(|e| StorageError::DownloadFailed {
                    provider: "local",
                    path: storage_path.to_string(),
                    reason: format!("decompression task failed: {e}"),
                })??
        } else {
            data
        };

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, out).await?;
        Ok(())
    }

    async fn delete_file(&self, storage_path: &str) -> Result<bool> {
        match self.resolve_existing(storage_path).await {
            Ok((path, _)) => {
                tokio::fs::remove_file(&path).await.map_err(|e| {
                    StorageError::DeleteFailed {
                        provider: "local",
                        path: storage_path.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(true)
            }
            Err(crate::Error::Storage(StorageError::ObjectNotFound { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, storage_path: &str) -> Result<bool> {
        match self.resolve_existing(storage_path).await {
            Ok(_) => Ok(true),
            Err(crate::Error::Storage(StorageError::ObjectNotFound { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_files(&self, prefix: &str) -> Result<Vec<String>> {
        let mut results = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative.to_string_lossy().replace('\\', "/");
                    if key.starts_with(prefix) {
                        results.push(key);
                    }
                }
            }
        }

        results.sort();
        Ok(results)
    }

    async fn get_metadata(&self, storage_path: &str) -> Result<ObjectMetadata> {
        let (path, compressed) = self.resolve_existing(storage_path).await?;
        let meta = tokio::fs::metadata(&path).await?;
        Ok(ObjectMetadata {
            size: meta.len(),
            compressed,
        })
    }
}
