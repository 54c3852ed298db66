//! Readability page metadata.

use crate::error::DatabaseError;
use crate::types::{PageMetadata, UrlId};
use crate::{Error, Result};

use super::{Database, UrlMetadataRow};

impl Database {
    /// Insert or replace the page metadata for an archived URL
    ///
    /// One record per URL; a re-archive overwrites the previous extraction.
    pub async fn upsert_url_metadata(
        &self,
        archived_url_id: UrlId,
        metadata: &PageMetadata,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO url_metadata (
                archived_url_id, title, byline, excerpt, site_name, lang,
                text_content, word_count, reading_time_minutes, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(archived_url_id) DO UPDATE SET
                title = excluded.title,
                byline = excluded.byline,
                excerpt = excluded.excerpt,
                site_name = excluded.site_name,
                lang = excluded.lang,
                text_content = excluded.text_content,
                word_count = excluded.word_count,
                reading_time_minutes = excluded.reading_time_minutes,
                created_at = excluded.created_at
            "#,
        )
        .bind(archived_url_id)
        .bind(&metadata.title)
        .bind(&metadata.byline)
        .bind(&metadata.excerpt)
        .bind(&metadata.site_name)
        .bind(&metadata.lang)
        .bind(&metadata.text_content)
        .bind(metadata.word_count)
        .bind(metadata.reading_time_minutes)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert url metadata: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get the page metadata for an archived URL
    pub async fn get_url_metadata(
        &self,
        archived_url_id: UrlId,
    ) -> Result<Option<UrlMetadataRow>> {
        let row = sqlx::query_as::<_, UrlMetadataRow>(
            "SELECT * FROM url_metadata WHERE archived_url_id = ?",
        )
        .bind(archived_url_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get url metadata: {}",
                e
            )))
        })?;

        Ok(row)
    }
}
