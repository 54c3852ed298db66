//! Archive-with-storage pipeline
//!
//! The orchestrator never calls `Archiver::archive` directly; it goes through
//! [`ArchivePipeline::archive_with_storage`], which wraps the run with the
//! storage fan-out, catalog promotion, database-storage notification, and
//! cleanup scheduling.

use super::Archiver;
use crate::cleanup::CleanupScheduler;
use crate::config::Config;
use crate::db::Database;
use crate::dbstore::{ArtifactStatusUpdate, DatabaseStorageProvider};
use crate::retry::with_retry;
use crate::storage::{FileStorageProvider, destination_path};
use crate::types::{
    ArchiveResult, ArchiveStatus, ArtifactId, Event, StorageUploadRecord, UrlId,
};
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything one archiver run needs beyond the archiver itself
#[derive(Clone)]
pub struct ArchivePipeline {
    config: Arc<Config>,
    db: Arc<Database>,
    file_storage: Arc<Vec<Arc<dyn FileStorageProvider>>>,
    db_storage: Arc<dyn DatabaseStorageProvider>,
    cleanup: CleanupScheduler,
    event_tx: broadcast::Sender<Event>,
}

impl ArchivePipeline {
    /// Assemble the pipeline from its collaborators
    pub fn new(
        config: Arc<Config>,
        db: Arc<Database>,
        file_storage: Arc<Vec<Arc<dyn FileStorageProvider>>>,
        db_storage: Arc<dyn DatabaseStorageProvider>,
        cleanup: CleanupScheduler,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            config,
            db,
            file_storage,
            db_storage,
            cleanup,
            event_tx,
        }
    }

    /// Run one archiver and drive its artifact through storage promotion
    ///
    /// 1. `archiver.archive(url, item_id)`
    /// 2. finalize the artifact row (status, exit code, path, size)
    /// 3. on success, upload to every configured provider (with retry) and
    ///    record the per-provider outcomes plus `all_uploads_succeeded`
    /// 4. notify the database storage provider (best-effort)
    /// 5. when every upload succeeded and cleanup is enabled, register the
    ///    local file for deferred removal
    ///
    /// Archiver errors propagate; the caller finalizes the row as an
    /// internal failure in that case.
    pub async fn archive_with_storage(
        &self,
        archiver: &dyn Archiver,
        url: &str,
        item_id: &str,
        archived_url_id: UrlId,
        rowid: ArtifactId,
    ) -> Result<ArchiveResult> {
        let mut result = archiver.archive(url, item_id).await?;

        let size_bytes = match result.saved_path.as_deref() {
            Some(path) => tokio::fs::metadata(path).await.ok().map(|m| m.len() as i64),
            None => None,
        };

        self.db
            .finalize_artifact(
                rowid,
                result.success,
                result.exit_code,
                result.saved_path.as_deref(),
                size_bytes,
            )
            .await?;

        self.event_tx
            .send(Event::ArchiveCompleted {
                item_id: item_id.to_string(),
                archiver: archiver.name().to_string(),
                success: result.success,
                exit_code: result.exit_code,
            })
            .ok();

        if result.success {
            if let Some(saved_path) = result.saved_path.clone() {
                let local_path = PathBuf::from(&saved_path);
                if !self.file_storage.is_empty() {
                    let uploads = self
                        .upload_to_all_providers(&local_path, item_id, archiver)
                        .await;
                    let all_succeeded = uploads.iter().all(|u| u.success);

                    self.db
                        .record_storage_uploads(rowid, &uploads, all_succeeded)
                        .await?;

                    result.storage_uploads = uploads;
                    result.all_uploads_succeeded = all_succeeded;

                    self.event_tx
                        .send(Event::UploadsCompleted {
                            item_id: item_id.to_string(),
                            archiver: archiver.name().to_string(),
                            all_succeeded,
                        })
                        .ok();

                    if all_succeeded && self.config.cleanup.enable_local_cleanup {
                        self.cleanup.schedule(
                            local_path,
                            rowid,
                            self.config.cleanup.local_workspace_retention_hours,
                        );
                    }
                }
            }
        }

        self.notify_db_storage(item_id, archiver.name(), &result, size_bytes)
            .await;

        // Keep the aggregate in sync after any size-affecting write
        self.db.recompute_total_size(archived_url_id).await?;

        Ok(result)
    }

    /// Upload one artifact to every provider independently
    ///
    /// Providers never short-circuit each other: a failure is recorded and
    /// the fan-out moves on. Transient failures are retried per the
    /// configured backoff before being recorded as failed.
    async fn upload_to_all_providers(
        &self,
        local_path: &Path,
        item_id: &str,
        archiver: &dyn Archiver,
    ) -> Vec<StorageUploadRecord> {
        let storage_path =
            destination_path(item_id, archiver.name(), archiver.output_extension());
        let compress = self.config.storage.compress_uploads;
        let mut records = Vec::with_capacity(self.file_storage.len());

        for provider in self.file_storage.iter() {
            let outcome = with_retry(&self.config.storage.upload_retry, || {
                provider.upload_file(local_path, &storage_path, compress)
            })
            .await;

            let record = match outcome {
                Ok(upload) => StorageUploadRecord {
                    provider_name: provider.provider_name().to_string(),
                    success: true,
                    storage_uri: Some(upload.uri),
                    original_size: Some(upload.original_size),
                    stored_size: Some(upload.stored_size),
                    compression_ratio: Some(upload.compression_ratio),
                    uploaded_at: Some(chrono::Utc::now().timestamp()),
                    error: None,
                },
                Err(e) => {
                    tracing::error!(
                        provider = provider.provider_name(),
                        item_id,
                        archiver = archiver.name(),
                        error = %e,
                        "Artifact upload failed"
                    );
                    StorageUploadRecord {
                        provider_name: provider.provider_name().to_string(),
                        success: false,
                        storage_uri: None,
                        original_size: None,
                        stored_size: None,
                        compression_ratio: None,
                        uploaded_at: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            records.push(record);
        }

        records
    }

    /// Best-effort notification of the database storage provider
    async fn notify_db_storage(
        &self,
        item_id: &str,
        archiver: &str,
        result: &ArchiveResult,
        size_bytes: Option<i64>,
    ) {
        let status = if result.success {
            ArchiveStatus::Success
        } else {
            ArchiveStatus::Failed
        };
        let primary_upload = result.storage_uploads.iter().find(|u| u.success);

        let update = ArtifactStatusUpdate {
            status,
            storage_uri: primary_upload.and_then(|u| u.storage_uri.clone()),
            size_bytes,
            compression_ratio: primary_upload.and_then(|u| u.compression_ratio),
        };

        if let Err(e) = self
            .db_storage
            .update_artifact_status(item_id, archiver, update)
            .await
        {
            tracing::warn!(
                item_id,
                archiver,
                error = %e,
                "Database storage notification failed"
            );
        }
    }
}
