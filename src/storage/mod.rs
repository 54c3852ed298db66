//! File storage providers
//!
//! Artifacts fan out to every configured provider under the provider-agnostic
//! path convention `archives/<item_id>/<archiver>/output.<ext>`. Compression
//! is negotiated per call; compressed objects get a `.gz` suffix and a
//! `compressed = true` metadata flag.
//!
//! Providers are individually thread-safe and never short-circuit each other:
//! the fan-out in [`crate::archivers::pipeline`] attempts every provider
//! independently.

use crate::config::{Config, StorageProviderKind};
use crate::error::StorageError;
use crate::Result;
use async_trait::async_trait;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

mod gcs;
mod local;

pub use gcs::GcsFileStorage;
pub use local::LocalFileStorage;

/// Successful upload outcome
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    /// Provider URI of the stored object
    pub uri: String,
    /// Size of the local file before compression
    pub original_size: u64,
    /// Size as stored
    pub stored_size: u64,
    /// stored_size / original_size
    pub compression_ratio: f64,
    /// Whether the object was gzip-compressed
    pub compressed: bool,
}

/// Metadata of a stored object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMetadata {
    /// Stored size in bytes
    pub size: u64,
    /// Whether the object is gzip-compressed (by the `.gz` suffix convention)
    pub compressed: bool,
}

/// Uniform interface over artifact storage backends
///
/// Storage paths are always relative, `/`-separated, and must not escape the
/// provider root.
#[async_trait]
pub trait FileStorageProvider: Send + Sync {
    /// Stable provider identifier recorded on upload records
    fn provider_name(&self) -> &'static str;

    /// Upload a local file to `destination_path`
    ///
    /// With `compress` the object is gzipped and stored under
    /// `<destination_path>.gz`; the returned result carries the actual URI.
    async fn upload_file(
        &self,
        local_path: &Path,
        destination_path: &str,
        compress: bool,
    ) -> Result<UploadResult>;

    /// Download a stored object to `local_path`
    ///
    /// Resolves the `.gz` variant when the plain path is absent; with
    /// `decompress` a gzipped object is inflated before writing.
    async fn download_file(
        &self,
        storage_path: &str,
        local_path: &Path,
        decompress: bool,
    ) -> Result<()>;

    /// Delete a stored object, returning whether it existed
    async fn delete_file(&self, storage_path: &str) -> Result<bool>;

    /// Whether an object exists at `storage_path` (or its `.gz` variant)
    async fn exists(&self, storage_path: &str) -> Result<bool>;

    /// List stored object paths under a prefix
    async fn list_files(&self, prefix: &str) -> Result<Vec<String>>;

    /// Metadata of a stored object (or its `.gz` variant)
    async fn get_metadata(&self, storage_path: &str) -> Result<ObjectMetadata>;

    /// Generate a time-limited access URL for a stored object
    ///
    /// Providers without URL signing return `Ok(None)`.
    async fn generate_access_url(
        &self,
        _storage_path: &str,
        _ttl: Duration,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Build the configured provider fan-out list, in configuration order
pub async fn build_providers(config: &Config) -> Result<Vec<Arc<dyn FileStorageProvider>>> {
    let mut providers: Vec<Arc<dyn FileStorageProvider>> = Vec::new();

    for kind in &config.storage.providers {
        match kind {
            StorageProviderKind::Local => {
                let root = config.storage.resolved_local_root(config.data_dir());
                providers.push(Arc::new(LocalFileStorage::new(root).await?));
            }
            StorageProviderKind::Gcs => {
                let bucket = config.storage.gcs.bucket.clone().ok_or_else(|| {
                    crate::Error::Config {
                        message: "gcs provider enabled without a bucket".into(),
                        key: Some("storage.gcs.bucket".into()),
                    }
                })?;
                let provider =
                    GcsFileStorage::new(bucket, config.storage.gcs.prefix.clone()).await?;
                providers.push(Arc::new(provider));
            }
        }
    }

    Ok(providers)
}

/// The destination path convention shared by all providers
pub fn destination_path(item_id: &str, archiver: &str, extension: &str) -> String {
    format!("archives/{item_id}/{archiver}/output.{extension}")
}

/// Reject absolute paths and parent-directory escapes
pub(crate) fn validate_storage_path(path: &str) -> Result<()> {
    if path.is_empty()
        || path.starts_with('/')
        || path.split('/').any(|segment| segment == "..")
    {
        return Err(StorageError::InvalidPath {
            path: path.into(),
            reason: "storage paths must be relative and must not escape the root".into(),
        }
        .into());
    }
    Ok(())
}

/// Gzip a byte buffer (best compression; artifacts are cold storage)
pub(crate) fn gzip_bytes(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Inflate a gzipped byte buffer
pub(crate) fn gunzip_bytes(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
