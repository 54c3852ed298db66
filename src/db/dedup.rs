//! Dedup/skip queries.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{ArchiveArtifact, Database};

impl Database {
    /// Find a successful artifact for `(item_id, url, archiver)`
    ///
    /// This is the dedup lookup used both at submission time and immediately
    /// before a worker runs an archiver. Only rows with a recorded path
    /// count: a successful artifact whose path was never stored cannot be
    /// reused. A 404 pre-flight row is `success = 0` and never matches.
    pub async fn find_successful_artifact(
        &self,
        item_id: &str,
        url: &str,
        archiver: &str,
    ) -> Result<Option<ArchiveArtifact>> {
        let row = sqlx::query_as::<_, ArchiveArtifact>(
            r#"
            SELECT a.* FROM archive_artifacts a
            JOIN archived_urls u ON u.id = a.archived_url_id
            WHERE u.item_id = ?
              AND u.url = ?
              AND a.archiver = ?
              AND a.success = 1
              AND a.saved_path IS NOT NULL
            ORDER BY a.id DESC
            LIMIT 1
            "#,
        )
        .bind(item_id)
        .bind(url)
        .bind(archiver)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to find successful artifact: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Find a recorded 404 pre-flight failure for `(item_id, url, archiver)`
    ///
    /// Backs the unreachable-URL policy: with `retry_unreachable` off, a URL
    /// that answered 404 once is terminal for its triple and resubmissions
    /// reuse the recorded failure instead of probing again. Pending rows
    /// never match (their exit code is cleared), so a requeued triple always
    /// gets a fresh probe.
    pub async fn find_unreachable_artifact(
        &self,
        item_id: &str,
        url: &str,
        archiver: &str,
    ) -> Result<Option<ArchiveArtifact>> {
        let row = sqlx::query_as::<_, ArchiveArtifact>(
            r#"
            SELECT a.* FROM archive_artifacts a
            JOIN archived_urls u ON u.id = a.archived_url_id
            WHERE u.item_id = ?
              AND u.url = ?
              AND a.archiver = ?
              AND a.success = 0
              AND a.exit_code = 404
            ORDER BY a.id DESC
            LIMIT 1
            "#,
        )
        .bind(item_id)
        .bind(url)
        .bind(archiver)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to find unreachable artifact: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Whether a successful artifact already exists for `(item_id, url, archiver)`
    pub async fn is_already_saved(
        &self,
        item_id: &str,
        url: &str,
        archiver: &str,
    ) -> Result<bool> {
        Ok(self
            .find_successful_artifact(item_id, url, archiver)
            .await?
            .is_some())
    }
}
