//! Archived URL CRUD operations.

use crate::error::DatabaseError;
use crate::types::UrlId;
use crate::{Error, Result};

use super::{ArchivedUrl, Database};

impl Database {
    /// Insert or update an archived URL, returning its id
    ///
    /// Idempotent on `url`: resubmitting an existing URL updates the item id
    /// and keeps any previously recorded name unless a new one is supplied.
    pub async fn upsert_archived_url(
        &self,
        item_id: &str,
        url: &str,
        name: Option<&str>,
    ) -> Result<UrlId> {
        let now = chrono::Utc::now().timestamp();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO archived_urls (item_id, url, name, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                item_id = excluded.item_id,
                name = COALESCE(excluded.name, archived_urls.name)
            RETURNING id
            "#,
        )
        .bind(item_id)
        .bind(url)
        .bind(name)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert archived url: {}",
                e
            )))
        })?;

        Ok(UrlId(id))
    }

    /// Get an archived URL by id
    pub async fn get_archived_url(&self, id: UrlId) -> Result<Option<ArchivedUrl>> {
        let row = sqlx::query_as::<_, ArchivedUrl>(
            r#"
            SELECT id, item_id, url, name, total_size_bytes, created_at
            FROM archived_urls
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get archived url: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Get an archived URL by its URL string
    pub async fn get_archived_url_by_url(&self, url: &str) -> Result<Option<ArchivedUrl>> {
        let row = sqlx::query_as::<_, ArchivedUrl>(
            r#"
            SELECT id, item_id, url, name, total_size_bytes, created_at
            FROM archived_urls
            WHERE url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get archived url by url: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Get the most recent archived URL for an item id
    pub async fn get_archived_url_by_item_id(&self, item_id: &str) -> Result<Option<ArchivedUrl>> {
        let row = sqlx::query_as::<_, ArchivedUrl>(
            r#"
            SELECT id, item_id, url, name, total_size_bytes, created_at
            FROM archived_urls
            WHERE item_id = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(item_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get archived url by item id: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List archived URLs, newest first
    pub async fn list_archived_urls(&self, limit: i64, offset: i64) -> Result<Vec<ArchivedUrl>> {
        let rows = sqlx::query_as::<_, ArchivedUrl>(
            r#"
            SELECT id, item_id, url, name, total_size_bytes, created_at
            FROM archived_urls
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list archived urls: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Recompute `total_size_bytes` from the URL's successful artifacts
    ///
    /// Called after every artifact write so the aggregate never drifts from
    /// the per-artifact sizes.
    pub async fn recompute_total_size(&self, id: UrlId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE archived_urls
            SET total_size_bytes = (
                SELECT COALESCE(SUM(size_bytes), 0)
                FROM archive_artifacts
                WHERE archived_url_id = ? AND success = 1
            )
            WHERE id = ?
            "#,
        )
        .bind(id)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to recompute total size: {}",
                e
            )))
        })?;

        Ok(())
    }
}
