//! Artifact rows: pending insertion, finalization, upload records, listings.

use crate::error::DatabaseError;
use crate::types::{ArchiveStatus, ArtifactId, StorageUploadRecord, UrlId};
use crate::{Error, Result};

use super::{ArchiveArtifact, ArtifactResultParams, Database, SaveRow};

const SAVE_ROW_SELECT: &str = r#"
    SELECT
        a.id, a.archived_url_id, a.archiver, a.success, a.exit_code,
        a.saved_path, a.size_bytes, a.status, a.task_id, a.created_at,
        u.item_id, u.url, u.name
    FROM archive_artifacts a
    JOIN archived_urls u ON u.id = a.archived_url_id
"#;

impl Database {
    /// Insert (or reset) a pending artifact row for `(archived_url_id, archiver)`
    ///
    /// The unique key means retries and requeues update in place: any prior
    /// terminal outcome and upload state is cleared, which is the explicit
    /// requeue transition — the only legitimate path from a terminal status
    /// back to pending.
    pub async fn insert_pending_artifact(
        &self,
        archived_url_id: UrlId,
        archiver: &str,
        task_id: Option<&str>,
    ) -> Result<ArtifactId> {
        let now = chrono::Utc::now().timestamp();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO archive_artifacts (
                archived_url_id, archiver, success, status, task_id, created_at
            ) VALUES (?, ?, 0, 'pending', ?, ?)
            ON CONFLICT(archived_url_id, archiver) DO UPDATE SET
                success = 0,
                exit_code = NULL,
                status = 'pending',
                task_id = excluded.task_id,
                uploaded_to_storage = 0,
                storage_uploads = NULL,
                all_uploads_succeeded = 0,
                local_file_deleted = 0,
                local_file_deleted_at = NULL,
                updated_at = excluded.created_at
            RETURNING id
            "#,
        )
        .bind(archived_url_id)
        .bind(archiver)
        .bind(task_id)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert pending artifact: {}",
                e
            )))
        })?;

        Ok(ArtifactId(id))
    }

    /// Finalize a pending artifact row with its terminal outcome
    ///
    /// Also recomputes the owning URL's total size so the aggregate invariant
    /// holds after every write.
    pub async fn finalize_artifact(
        &self,
        rowid: ArtifactId,
        success: bool,
        exit_code: Option<i32>,
        saved_path: Option<&str>,
        size_bytes: Option<i64>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let status = if success {
            ArchiveStatus::Success
        } else {
            ArchiveStatus::Failed
        };

        let url_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE archive_artifacts
            SET success = ?, exit_code = ?, saved_path = ?, size_bytes = ?,
                status = ?, updated_at = ?
            WHERE id = ?
            RETURNING archived_url_id
            "#,
        )
        .bind(success)
        .bind(exit_code)
        .bind(saved_path)
        .bind(size_bytes)
        .bind(status.as_str())
        .bind(now)
        .bind(rowid)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to finalize artifact: {}",
                e
            )))
        })?;

        if let Some(url_id) = url_id {
            self.recompute_total_size(UrlId(url_id)).await?;
        }

        Ok(())
    }

    /// Record a terminal artifact result directly (synchronous archive path)
    ///
    /// Upserts on `(archived_url_id, archiver)`, so repeated synchronous runs
    /// update the existing row rather than duplicating it.
    pub async fn insert_artifact_result(
        &self,
        params: ArtifactResultParams<'_>,
    ) -> Result<ArtifactId> {
        let now = chrono::Utc::now().timestamp();
        let status = if params.success {
            ArchiveStatus::Success
        } else {
            ArchiveStatus::Failed
        };

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO archive_artifacts (
                archived_url_id, archiver, success, exit_code, saved_path,
                size_bytes, status, task_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(archived_url_id, archiver) DO UPDATE SET
                success = excluded.success,
                exit_code = excluded.exit_code,
                saved_path = excluded.saved_path,
                size_bytes = excluded.size_bytes,
                status = excluded.status,
                task_id = excluded.task_id,
                updated_at = excluded.created_at
            RETURNING id
            "#,
        )
        .bind(params.archived_url_id)
        .bind(params.archiver)
        .bind(params.success)
        .bind(params.exit_code)
        .bind(params.saved_path)
        .bind(params.size_bytes)
        .bind(status.as_str())
        .bind(params.task_id)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert artifact result: {}",
                e
            )))
        })?;

        self.recompute_total_size(params.archived_url_id).await?;

        Ok(ArtifactId(id))
    }

    /// Record the per-provider upload outcomes of an artifact
    ///
    /// `uploaded_to_storage` tracks full promotion: it is set only when every
    /// provider accepted the upload, matching the cleanup eligibility rule.
    pub async fn record_storage_uploads(
        &self,
        rowid: ArtifactId,
        uploads: &[StorageUploadRecord],
        all_succeeded: bool,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let json = serde_json::to_string(uploads)?;

        sqlx::query(
            r#"
            UPDATE archive_artifacts
            SET uploaded_to_storage = ?, storage_uploads = ?,
                all_uploads_succeeded = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(all_succeeded)
        .bind(json)
        .bind(all_succeeded)
        .bind(now)
        .bind(rowid)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record storage uploads: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Mark an artifact's local file as deleted
    ///
    /// The guard on `all_uploads_succeeded` enforces the cleanup-safety
    /// invariant at the catalog level; returns false when the artifact was
    /// not eligible (or does not exist).
    pub async fn mark_local_file_deleted(&self, rowid: ArtifactId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE archive_artifacts
            SET local_file_deleted = 1, local_file_deleted_at = ?, updated_at = ?
            WHERE id = ? AND all_uploads_succeeded = 1 AND local_file_deleted = 0
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(rowid)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark local file deleted: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Update an artifact's status by `(item_id, archiver)` key
    ///
    /// Monotonic: a terminal status is never replaced by `pending` through
    /// this path (the explicit requeue operation is the only way back).
    /// Returns whether a row was updated.
    pub async fn update_artifact_status_by_key(
        &self,
        item_id: &str,
        archiver: &str,
        status: ArchiveStatus,
        size_bytes: Option<i64>,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let url_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE archive_artifacts
            SET status = ?,
                success = (? = 'success'),
                size_bytes = COALESCE(?, size_bytes),
                updated_at = ?
            WHERE id IN (
                SELECT a.id FROM archive_artifacts a
                JOIN archived_urls u ON u.id = a.archived_url_id
                WHERE u.item_id = ? AND a.archiver = ?
            )
            AND NOT (? = 'pending' AND status IN ('success', 'failed'))
            RETURNING archived_url_id
            "#,
        )
        .bind(status.as_str())
        .bind(status.as_str())
        .bind(size_bytes)
        .bind(now)
        .bind(item_id)
        .bind(archiver)
        .bind(status.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update artifact status: {}",
                e
            )))
        })?;

        if let Some(url_id) = url_id {
            self.recompute_total_size(UrlId(url_id)).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Get an artifact row by id
    pub async fn get_artifact_by_id(&self, rowid: ArtifactId) -> Result<Option<ArchiveArtifact>> {
        let row = sqlx::query_as::<_, ArchiveArtifact>(
            "SELECT * FROM archive_artifacts WHERE id = ?",
        )
        .bind(rowid)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get artifact: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Get an artifact by item id and archiver name
    pub async fn get_artifact(
        &self,
        item_id: &str,
        archiver: &str,
    ) -> Result<Option<ArchiveArtifact>> {
        let row = sqlx::query_as::<_, ArchiveArtifact>(
            r#"
            SELECT a.* FROM archive_artifacts a
            JOIN archived_urls u ON u.id = a.archived_url_id
            WHERE u.item_id = ? AND a.archiver = ?
            ORDER BY a.id DESC
            LIMIT 1
            "#,
        )
        .bind(item_id)
        .bind(archiver)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get artifact by item/archiver: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Get a joined save row by artifact id (admin surface)
    pub async fn get_save_by_rowid(&self, rowid: i64) -> Result<Option<SaveRow>> {
        let sql = format!("{SAVE_ROW_SELECT} WHERE a.id = ?");
        let row = sqlx::query_as::<_, SaveRow>(&sql)
            .bind(rowid)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get save by rowid: {}",
                    e
                )))
            })?;

        Ok(row)
    }

    /// List joined save rows for one item id
    pub async fn get_saves_by_item_id(&self, item_id: &str) -> Result<Vec<SaveRow>> {
        let sql = format!("{SAVE_ROW_SELECT} WHERE u.item_id = ? ORDER BY a.id ASC");
        let rows = sqlx::query_as::<_, SaveRow>(&sql)
            .bind(item_id)
            .fetch_all(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get saves by item id: {}",
                    e
                )))
            })?;

        Ok(rows)
    }

    /// List joined save rows for one URL
    pub async fn get_saves_by_url(&self, url: &str) -> Result<Vec<SaveRow>> {
        let sql = format!("{SAVE_ROW_SELECT} WHERE u.url = ? ORDER BY a.id ASC");
        let rows = sqlx::query_as::<_, SaveRow>(&sql)
            .bind(url)
            .fetch_all(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get saves by url: {}",
                    e
                )))
            })?;

        Ok(rows)
    }

    /// Paginated listing of all save rows, newest first (admin surface)
    pub async fn list_saves(&self, limit: i64, offset: i64) -> Result<Vec<SaveRow>> {
        let sql = format!("{SAVE_ROW_SELECT} ORDER BY a.id DESC LIMIT ? OFFSET ?");
        let rows = sqlx::query_as::<_, SaveRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to list saves: {}",
                    e
                )))
            })?;

        Ok(rows)
    }

    /// Delete artifact rows by id, returning the number deleted
    pub async fn delete_artifacts_by_ids(&self, rowids: &[i64]) -> Result<u64> {
        if rowids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; rowids.len()].join(", ");
        let sql = format!("DELETE FROM archive_artifacts WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in rowids {
            query = query.bind(id);
        }

        let result = query.execute(self.pool()).await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to delete artifacts: {}",
                e
            )))
        })?;

        Ok(result.rows_affected())
    }

    /// Per-artifact size breakdown for one archived URL
    pub async fn get_size_stats(
        &self,
        archived_url_id: UrlId,
    ) -> Result<Vec<(String, Option<i64>, Option<String>)>> {
        let rows: Vec<(String, Option<i64>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT archiver, size_bytes, saved_path
            FROM archive_artifacts
            WHERE archived_url_id = ? AND success = 1
            ORDER BY id ASC
            "#,
        )
        .bind(archived_url_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get size stats: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Artifacts whose local files are eligible for deferred cleanup
    ///
    /// Successful, fully promoted, not yet deleted, with a recorded path.
    /// Used by the cleanup scheduler to restore its worklist after a restart.
    pub async fn list_cleanup_candidates(&self) -> Result<Vec<(ArtifactId, String)>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT id, saved_path
            FROM archive_artifacts
            WHERE success = 1
              AND all_uploads_succeeded = 1
              AND local_file_deleted = 0
              AND saved_path IS NOT NULL
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list cleanup candidates: {}",
                e
            )))
        })?;

        Ok(rows
            .into_iter()
            .map(|(id, path)| (ArtifactId(id), path))
            .collect())
    }
}
