//! Admin surface: listings, catalog deletion, requeue, re-summarize.

use super::PageArchiver;
use crate::types::{
    AdminSaveRow, BatchItem, BatchTask, DeleteResponse, Event, SummarizeRequest,
    SummarizeResponse, TaskAccepted,
};
use crate::utils::{path_within, prune_empty_parents, sanitize_identifier};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

impl PageArchiver {
    /// Paginated artifact listing with a file-existence probe
    ///
    /// The archiver name falls back to the path convention
    /// (`.../<item_id>/<archiver>/<file>`) for rows recorded before the
    /// archiver column existed.
    pub async fn list_saves_admin(&self, limit: i64, offset: i64) -> Result<Vec<AdminSaveRow>> {
        let rows = self.db.list_saves(limit, offset).await?;
        let data_root = self.config.data_dir().clone();

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut file_exists = false;
            let mut relative_path = None;
            let mut archiver = Some(row.archiver.clone()).filter(|a| !a.is_empty());

            if let Some(saved_path) = row.saved_path.as_deref() {
                let path = Path::new(saved_path);
                file_exists = path.exists();
                if let (Ok(resolved), Ok(root)) = (path.canonicalize(), data_root.canonicalize()) {
                    if let Ok(relative) = resolved.strip_prefix(&root) {
                        relative_path = Some(relative.display().to_string());
                    }
                }
                if archiver.is_none() {
                    archiver = infer_archiver_from_path(path);
                }
            }

            let created_at = chrono::DateTime::from_timestamp(row.created_at, 0)
                .map(|dt| dt.to_rfc3339());

            let status = row.archive_status();
            out.push(AdminSaveRow {
                rowid: row.id,
                id: row.item_id,
                url: row.url,
                name: row.name,
                status,
                success: if row.success { 1 } else { 0 },
                exit_code: row.exit_code,
                saved_path: row.saved_path,
                file_exists,
                relative_path,
                archiver,
                created_at,
            });
        }

        Ok(out)
    }

    /// Delete one artifact row, optionally removing its local file
    pub async fn delete_save(&self, rowid: i64, remove_files: bool) -> Result<DeleteResponse> {
        let row = self
            .db
            .get_save_by_rowid(rowid)
            .await?
            .ok_or_else(|| Error::NotFound(format!("save {rowid}")))?;

        let deleted = self.db.delete_artifacts_by_ids(&[rowid]).await?;

        let (removed_files, errors) = if remove_files {
            self.remove_artifact_files(row.saved_path.iter().map(PathBuf::from).collect())
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(DeleteResponse {
            deleted_count: deleted,
            deleted_rowids: vec![rowid],
            removed_files,
            errors,
            ok: true,
        })
    }

    /// Delete every artifact row of one item id
    pub async fn delete_saves_by_item(
        &self,
        item_id: &str,
        remove_files: bool,
    ) -> Result<DeleteResponse> {
        let safe_id = sanitize_identifier(item_id.trim());
        let rows = self.db.get_saves_by_item_id(&safe_id).await?;
        if rows.is_empty() {
            return Err(Error::NotFound(format!("no saves for item {safe_id}")));
        }

        self.delete_rows(rows, remove_files).await
    }

    /// Delete every artifact row of one URL
    pub async fn delete_saves_by_url(
        &self,
        url: &str,
        remove_files: bool,
    ) -> Result<DeleteResponse> {
        let rows = self.db.get_saves_by_url(url).await?;
        if rows.is_empty() {
            return Err(Error::NotFound(format!("no saves for url {url}")));
        }

        self.delete_rows(rows, remove_files).await
    }

    async fn delete_rows(
        &self,
        rows: Vec<crate::db::SaveRow>,
        remove_files: bool,
    ) -> Result<DeleteResponse> {
        let rowids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let paths: Vec<PathBuf> = rows
            .iter()
            .filter_map(|r| r.saved_path.as_deref())
            .map(PathBuf::from)
            .collect();

        let deleted = self.db.delete_artifacts_by_ids(&rowids).await?;

        let (removed_files, errors) = if remove_files {
            self.remove_artifact_files(paths)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(DeleteResponse {
            deleted_count: deleted,
            deleted_rowids: rowids,
            removed_files,
            errors,
            ok: true,
        })
    }

    /// Best-effort local file removal, confined to the data directory
    ///
    /// Object-store copies are left in place; see the retrieval/cleanup
    /// lifecycle for why admin deletion is local-only.
    fn remove_artifact_files(&self, paths: Vec<PathBuf>) -> (Vec<String>, Vec<String>) {
        let data_root = self.config.data_dir();
        let mut removed = Vec::new();
        let mut errors = Vec::new();

        for path in paths {
            if !path.exists() {
                continue;
            }
            if !path_within(&path, data_root) {
                errors.push(format!(
                    "refusing to remove '{}': outside the data directory",
                    path.display()
                ));
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    removed.push(path.display().to_string());
                    prune_empty_parents(&path, data_root);
                }
                Err(e) => errors.push(format!("{}: {e}", path.display())),
            }
        }

        (removed, errors)
    }

    /// Reset one artifact to pending and re-enqueue it
    ///
    /// The sanctioned terminal-to-pending transition: the row's outcome and
    /// upload state are cleared, and the re-archive re-runs the full storage
    /// fan-out.
    pub async fn requeue_save(&self, rowid: i64) -> Result<TaskAccepted> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let row = self
            .db
            .get_save_by_rowid(rowid)
            .await?
            .ok_or_else(|| Error::NotFound(format!("save {rowid}")))?;

        let task_id = uuid::Uuid::new_v4().simple().to_string();
        let pending_rowid = self
            .db
            .insert_pending_artifact(
                crate::types::UrlId(row.archived_url_id),
                &row.archiver,
                Some(&task_id),
            )
            .await?;

        let task = BatchTask {
            task_id: task_id.clone(),
            archiver_name: row.archiver.clone(),
            items: vec![BatchItem {
                item_id: row.item_id,
                url: row.url,
                rowid: pending_rowid,
                archiver_name: row.archiver,
            }],
        };

        {
            let capacity = self.config.workers.queue_capacity;
            let mut queue = self.queue_state.queue.lock().await;
            if queue.len() >= capacity {
                return Err(Error::QueueFull { capacity });
            }
            queue.push_back(task);
        }
        self.ensure_processor_started();
        self.emit_event(Event::TaskQueued {
            task_id: task_id.clone(),
            count: 1,
        });

        tracing::info!(rowid, task_id = %task_id, "Artifact requeued");

        Ok(TaskAccepted { task_id, count: 1 })
    }

    /// Re-notify the summarization collaborator for a known artifact
    pub async fn summarize(&self, request: SummarizeRequest) -> Result<SummarizeResponse> {
        if self.summarization.is_none() {
            return Err(Error::SummarizerUnavailable);
        }

        let (rowid, archived_url_id) = if let Some(rowid) = request.rowid {
            let row = self
                .db
                .get_save_by_rowid(rowid)
                .await?
                .ok_or_else(|| Error::NotFound(format!("save {rowid}")))?;
            (row.id, row.archived_url_id)
        } else if let Some(item_id) = request.item_id.as_deref().filter(|s| !s.trim().is_empty()) {
            let safe_id = sanitize_identifier(item_id.trim());
            let rows = self.db.get_saves_by_item_id(&safe_id).await?;
            let first = rows
                .into_iter()
                .next()
                .ok_or_else(|| Error::NotFound(format!("no saves for item {safe_id}")))?;
            (first.id, first.archived_url_id)
        } else if let Some(url) = request.url.as_deref().filter(|s| !s.is_empty()) {
            let rows = self.db.get_saves_by_url(url).await?;
            let first = rows
                .into_iter()
                .next()
                .ok_or_else(|| Error::NotFound(format!("no saves for url {url}")))?;
            (first.id, first.archived_url_id)
        } else {
            return Err(Error::Validation(
                "rowid, item_id, or url is required".into(),
            ));
        };

        let summary_created = self
            .summarization
            .as_ref()
            .map(|n| n.schedule(rowid, Some(archived_url_id), "admin-api"))
            .unwrap_or(false);

        Ok(SummarizeResponse {
            ok: true,
            archived_url_id,
            summary_created,
        })
    }
}

/// Infer the archiver from the `.../<item_id>/<archiver>/<file>` convention
fn infer_archiver_from_path(path: &Path) -> Option<String> {
    path.parent()?
        .file_name()?
        .to_str()
        .map(|s| s.to_string())
}
