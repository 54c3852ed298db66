//! Task status aggregation.

use super::PageArchiver;
use crate::types::{ArchiveStatus, SizeStatsResponse, ArtifactSize, TaskItemStatus, TaskStatusResponse, UrlId};
use crate::{Error, Result};

impl PageArchiver {
    /// Aggregate status across a task's pending rows
    ///
    /// A batch task is durable only through its artifact rows, so this works
    /// across restarts. Overall status: `pending` if any item is pending,
    /// else `failed` if any failed, else `success`.
    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse> {
        let rows = self.db.get_task_rows(task_id).await?;
        if rows.is_empty() {
            return Err(Error::NotFound(format!("task {task_id}")));
        }

        let items: Vec<TaskItemStatus> = rows
            .into_iter()
            .map(|row| TaskItemStatus {
                status: row.archive_status(),
                url: row.url,
                id: row.item_id,
                name: row.name,
                archiver: Some(row.archiver),
                exit_code: row.exit_code,
                saved_path: row.saved_path,
                db_rowid: row.id,
            })
            .collect();

        let status = if items.iter().any(|i| i.status == ArchiveStatus::Pending) {
            ArchiveStatus::Pending
        } else if items.iter().any(|i| i.status == ArchiveStatus::Failed) {
            ArchiveStatus::Failed
        } else {
            ArchiveStatus::Success
        };

        Ok(TaskStatusResponse {
            task_id: task_id.to_string(),
            status,
            items,
        })
    }

    /// Size statistics for one archived URL
    pub async fn size_stats(&self, archived_url_id: i64) -> Result<SizeStatsResponse> {
        let url = self
            .db
            .get_archived_url(UrlId(archived_url_id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("archived url {archived_url_id}")))?;

        let artifacts = self
            .db
            .get_size_stats(UrlId(archived_url_id))
            .await?
            .into_iter()
            .map(|(archiver, size_bytes, saved_path)| ArtifactSize {
                archiver,
                size_bytes,
                saved_path,
            })
            .collect();

        Ok(SizeStatsResponse {
            total_size_bytes: url.total_size_bytes.unwrap_or(0),
            artifacts,
        })
    }
}
