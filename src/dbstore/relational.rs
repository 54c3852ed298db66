//! Relational provider: a thin adapter over the sqlx catalog.

use super::{
    ArtifactRecord, ArtifactStatusUpdate, ArticleRecord, DatabaseStorageProvider, NewArticle,
};
use crate::db::Database;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The transactional catalog exposed through the provider interface
pub struct RelationalStorage {
    db: Arc<Database>,
}

impl RelationalStorage {
    /// Wrap the catalog handle
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn article_from_url_row(row: crate::db::ArchivedUrl) -> ArticleRecord {
    ArticleRecord {
        item_id: row.item_id,
        url: row.url,
        name: row.name,
        total_size_bytes: row.total_size_bytes,
        metadata: serde_json::Map::new(),
        created_at: row.created_at,
    }
}

fn artifact_from_row(row: crate::db::ArchiveArtifact) -> ArtifactRecord {
    let storage_uri = row
        .upload_records()
        .iter()
        .find(|r| r.success)
        .and_then(|r| r.storage_uri.clone());
    ArtifactRecord {
        status: row.archive_status(),
        storage_uri,
        size_bytes: row.size_bytes,
        compression_ratio: None,
        updated_at: row.updated_at.unwrap_or(row.created_at),
        archiver: row.archiver,
    }
}

#[async_trait]
impl DatabaseStorageProvider for RelationalStorage {
    fn provider_name(&self) -> &'static str {
        "relational"
    }

    async fn create_article(&self, article: NewArticle<'_>) -> Result<()> {
        self.db
            .upsert_archived_url(article.item_id, article.url, article.name)
            .await?;
        Ok(())
    }

    async fn get_article(&self, item_id: &str) -> Result<Option<ArticleRecord>> {
        Ok(self
            .db
            .get_archived_url_by_item_id(item_id)
            .await?
            .map(article_from_url_row))
    }

    async fn get_artifact(&self, item_id: &str, archiver: &str) -> Result<Option<ArtifactRecord>> {
        Ok(self
            .db
            .get_artifact(item_id, archiver)
            .await?
            .map(artifact_from_row))
    }

    async fn list_artifacts(&self, item_id: &str) -> Result<Vec<ArtifactRecord>> {
        let Some(url) = self.db.get_archived_url_by_item_id(item_id).await? else {
            return Ok(Vec::new());
        };

        let rows = self.db.get_saves_by_item_id(&url.item_id).await?;
        let mut artifacts = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(artifact) = self
                .db
                .get_artifact_by_id(crate::types::ArtifactId(row.id))
                .await?
            {
                artifacts.push(artifact_from_row(artifact));
            }
        }
        Ok(artifacts)
    }

    async fn list_articles(&self, limit: i64, offset: i64) -> Result<Vec<ArticleRecord>> {
        Ok(self
            .db
            .list_archived_urls(limit, offset)
            .await?
            .into_iter()
            .map(article_from_url_row)
            .collect())
    }

    async fn update_artifact_status(
        &self,
        item_id: &str,
        archiver: &str,
        update: ArtifactStatusUpdate,
    ) -> Result<()> {
        let updated = self
            .db
            .update_artifact_status_by_key(item_id, archiver, update.status, update.size_bytes)
            .await?;
        if !updated {
            tracing::debug!(
                item_id,
                archiver,
                status = update.status.as_str(),
                "Artifact status update skipped (no row, or terminal row vs pending)"
            );
        }
        Ok(())
    }

    async fn update_article_metadata(
        &self,
        item_id: &str,
        fields: serde_json::Value,
    ) -> Result<()> {
        // The normalized catalog has no free-form metadata bag; only the
        // display name is recognized here. Everything else is document-store
        // territory.
        if let Some(name) = fields.get("name").and_then(|v| v.as_str()) {
            if let Some(url) = self.db.get_archived_url_by_item_id(item_id).await? {
                self.db
                    .upsert_archived_url(&url.item_id, &url.url, Some(name))
                    .await?;
            }
        }
        Ok(())
    }
}
