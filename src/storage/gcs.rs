//! Google Cloud Storage provider.

use super::{
    FileStorageProvider, ObjectMetadata, UploadResult, gunzip_bytes, gzip_bytes,
    validate_storage_path,
};
use crate::error::StorageError;
use crate::Result;
use async_trait::async_trait;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::sign::{SignedURLMethod, SignedURLOptions};
use std::path::Path;
use std::time::Duration;

/// Artifact storage in a GCS bucket
///
/// Objects are gzipped client-side before upload (the `.gz` suffix convention
/// mirrors the local provider) and access URLs are V4 signed URLs.
pub struct GcsFileStorage {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl GcsFileStorage {
    /// Create the provider with application-default credentials
    pub async fn new(bucket: String, prefix: Option<String>) -> Result<Self> {
        let config = ClientConfig::default().with_auth().await.map_err(|e| {
            StorageError::Client {
                provider: "gcs",
                reason: format!("failed to initialize credentials: {e}"),
            }
        })?;

        Ok(Self {
            client: Client::new(config),
            bucket,
            prefix,
        })
    }

    fn object_name(&self, storage_path: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), storage_path),
            None => storage_path.to_string(),
        }
    }

    async fn object_exists(&self, object: &str) -> Result<bool> {
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            object: object.to_string(),
            ..Default::default()
        };
        match self.client.get_object(&request).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(StorageError::Client {
                provider: "gcs",
                reason: e.to_string(),
            }
            .into()),
        }
    }

    /// Resolve an object name, preferring the exact path over its `.gz` variant
    async fn resolve_existing(&self, storage_path: &str) -> Result<(String, bool)> {
        let plain = self.object_name(storage_path);
        if self.object_exists(&plain).await? {
            return Ok((plain, storage_path.ends_with(".gz")));
        }
        let gz = self.object_name(&format!("{storage_path}.gz"));
        if self.object_exists(&gz).await? {
            return Ok((gz, true));
        }
        Err(StorageError::ObjectNotFound {
            provider: "gcs",
            path: storage_path.to_string(),
        }
        .into())
    }
}

fn is_not_found(error: &google_cloud_storage::http::Error) -> bool {
    matches!(
        error,
        google_cloud_storage::http::Error::Response(r) if r.code == 404
    )
}

#[async_trait]
impl FileStorageProvider for GcsFileStorage {
    fn provider_name(&self) -> &'static str {
        "gcs"
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
                provider: "gcs",
                path: destination_path.to_string(),
                reason: format!("failed to read '{}': {e}", local_path.display()),
            }
        })?;
        let original_size = data.len() as u64;

        let (stored, final_path) = if compress {
            let compressed = tokio::task::spawn_blocking(move || gzip_bytes(&data))
                .await
                .map_err(|e| StorageError::UploadFailed {
                    provider: "gcs",
                    path: destination_path.to_string(),
                    reason: format!("compression task failed: {e}"),
                })??;
            (compressed, format!("{destination_path}.gz"))
        } else {
            (data, destination_path.to_string())
        };
        let stored_size = stored.len() as u64;
        let object = self.object_name(&final_path);

        let request = UploadObjectRequest {
            bucket: self.bucket.clone(),
            ..Default::default()
        };
        let media = Media::new(object.clone());
        self.client
            .upload_object(&request, stored, &UploadType::Simple(media))
            .await
            .map_err(|e| StorageError::UploadFailed {
                provider: "gcs",
                path: final_path.clone(),
                reason: e.to_string(),
            })?;

        Ok(UploadResult {
            uri: format!("gs://{}/{}", self.bucket, object),
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
        let (object, compressed) = self.resolve_existing(storage_path).await?;

        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            object,
            ..Default::default()
        };
        let data = self
            .client
            .download_object(&request, &Range::default())
            .await
            .map_err(|e| StorageError::DownloadFailed {
                provider: "gcs",
                path: storage_path.to_string(),
                reason: e.to_string(),
            })?;

        let out = if decompress && compressed {
            tokio::task::spawn_blocking(move || gunzip_bytes(&data))
                .await
                .map_err(|e| StorageError::DownloadFailed {
                    provider: "gcs",
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
        let (object, _) = match self.resolve_existing(storage_path).await {
            Ok(resolved) => resolved,
            Err(crate::Error::Storage(StorageError::ObjectNotFound { .. })) => return Ok(false),
            Err(e) => return Err(e),
        };

        let request = DeleteObjectRequest {
            bucket: self.bucket.clone(),
            object,
            ..Default::default()
        };
        self.client
            .delete_object(&request)
            .await
            .map_err(|e| StorageError::DeleteFailed {
                provider: "gcs",
                path: storage_path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(true)
    }

    async fn exists(&self, storage_path: &str) -> Result<bool> {
        match self.resolve_existing(storage_path).await {
            Ok(_) => Ok(true),
            Err(crate::Error::Storage(StorageError::ObjectNotFound { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_files(&self, prefix: &str) -> Result<Vec<String>> {
        let full_prefix = self.object_name(prefix);
        let strip = self.object_name("");
        let mut results = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let request = ListObjectsRequest {
                bucket: self.bucket.clone(),
                prefix: Some(full_prefix.clone()),
                page_token: page_token.clone(),
                ..Default::default()
            };
            let response = self.client.list_objects(&request).await.map_err(|e| {
                StorageError::Client {
                    provider: "gcs",
                    reason: e.to_string(),
                }
            })?;

            if let Some(items) = response.items {
                for object in items {
                    let name = object
                        .name
                        .strip_prefix(&strip)
                        .unwrap_or(&object.name)
                        .to_string();
                    results.push(name);
                }
            }

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        results.sort();
        Ok(results)
    }

    async fn get_metadata(&self, storage_path: &str) -> Result<ObjectMetadata> {
        let (object, compressed) = self.resolve_existing(storage_path).await?;

        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            object,
            ..Default::default()
        };
        let meta = self.client.get_object(&request).await.map_err(|e| {
            StorageError::Client {
                provider: "gcs",
                reason: e.to_string(),
            }
        })?;

        Ok(ObjectMetadata {
            size: meta.size.max(0) as u64,
            compressed,
        })
    }

    async fn generate_access_url(
        &self,
        storage_path: &str,
        ttl: Duration,
    ) -> Result<Option<String>> {
        let (object, _) = self.resolve_existing(storage_path).await?;

        let options = SignedURLOptions {
            method: SignedURLMethod::GET,
            expires: ttl,
            ..Default::default()
        };
        let url = self
            .client
            .signed_url(&self.bucket, &object, None, None, options)
            .await
            .map_err(|e| StorageError::Client {
                provider: "gcs",
                reason: format!("failed to sign URL: {e}"),
            })?;

        Ok(Some(url))
    }
}
