//! Task status rows.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, SaveRow};

impl Database {
    /// All artifact rows belonging to one task, in insertion order
    ///
    /// A batch task is only durable through its pending artifact rows; this
    /// query is what lets `/tasks/{task_id}` surface outcomes even after a
    /// restart dropped the in-memory task.
    pub async fn get_task_rows(&self, task_id: &str) -> Result<Vec<SaveRow>> {
        let rows = sqlx::query_as::<_, SaveRow>(
            r#"
            SELECT
                a.id, a.archived_url_id, a.archiver, a.success, a.exit_code,
                a.saved_path, a.size_bytes, a.status, a.task_id, a.created_at,
                u.item_id, u.url, u.name
            FROM archive_artifacts a
            JOIN archived_urls u ON u.id = a.archived_url_id
            WHERE a.task_id = ?
            ORDER BY a.id ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get task rows: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
