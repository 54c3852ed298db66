//! Document provider: denormalized per-item JSON documents.

use super::{
    ArtifactRecord, ArtifactStatusUpdate, ArticleRecord, DatabaseStorageProvider, NewArticle,
};
use crate::error::DatabaseError;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The denormalized document shape: one article with embedded artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArticleDocument {
    item_id: String,
    url: String,
    name: Option<String>,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    artifacts: BTreeMap<String, ArtifactRecord>,
    created_at: i64,
}

/// Keyed document store backed by a directory of JSON files
///
/// One document per item id, artifacts embedded, writes atomic via a temp
/// file rename. This is the replica side of dual persistence: a read-
/// optimized denormalized mirror that may trail the transactional catalog.
pub struct DocumentStorage {
    dir: PathBuf,
}

impl DocumentStorage {
    /// Create the provider, ensuring the document directory exists
    pub async fn new(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to create document store directory '{}': {e}",
                dir.display()
            )))
        })?;
        Ok(Self { dir })
    }

    fn document_path(&self, item_id: &str) -> PathBuf {
        // item ids are sanitized before reaching any provider, so they are
        // valid single-segment file names
        self.dir.join(format!("{item_id}.json"))
    }

    async fn read_document(&self, item_id: &str) -> Result<Option<ArticleDocument>> {
        let path = self.document_path(item_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let doc: ArticleDocument = serde_json::from_slice(&bytes)?;
                Ok(Some(doc))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, doc: &ArticleDocument) -> Result<()> {
        let path = self.document_path(&doc.item_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(doc)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn article_from_document(doc: ArticleDocument) -> ArticleRecord {
    let total: i64 = doc
        .artifacts
        .values()
        .filter(|a| a.status == crate::types::ArchiveStatus::Success)
        .filter_map(|a| a.size_bytes)
        .sum();
    ArticleRecord {
        item_id: doc.item_id,
        url: doc.url,
        name: doc.name,
        total_size_bytes: if doc.artifacts.is_empty() {
            None
        } else {
            Some(total)
        },
        metadata: doc.metadata,
        created_at: doc.created_at,
    }
}

#[async_trait]
impl DatabaseStorageProvider for DocumentStorage {
    fn provider_name(&self) -> &'static str {
        "document"
    }

    async fn create_article(&self, article: NewArticle<'_>) -> Result<()> {
        if self.read_document(article.item_id).await?.is_some() {
            return Ok(());
        }

        let doc = ArticleDocument {
            item_id: article.item_id.to_string(),
            url: article.url.to_string(),
            name: article.name.map(String::from),
            metadata: serde_json::Map::new(),
            artifacts: BTreeMap::new(),
            created_at: chrono::Utc::now().timestamp(),
        };
        self.write_document(&doc).await
    }

    async fn get_article(&self, item_id: &str) -> Result<Option<ArticleRecord>> {
        Ok(self
            .read_document(item_id)
            .await?
            .map(article_from_document))
    }

    async fn get_artifact(&self, item_id: &str, archiver: &str) -> Result<Option<ArtifactRecord>> {
        Ok(self
            .read_document(item_id)
            .await?
            .and_then(|doc| doc.artifacts.get(archiver).cloned()))
    }

    async fn list_artifacts(&self, item_id: &str) -> Result<Vec<ArtifactRecord>> {
        Ok(self
            .read_document(item_id)
            .await?
            .map(|doc| doc.artifacts.into_values().collect())
            .unwrap_or_default())
    }

    async fn list_articles(&self, limit: i64, offset: i64) -> Result<Vec<ArticleRecord>> {
        let mut documents = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(item_id) = document_item_id(&path) {
                if let Some(doc) = self.read_document(&item_id).await? {
                    documents.push(doc);
                }
            }
        }

        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.item_id.cmp(&a.item_id)));

        Ok(documents
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(article_from_document)
            .collect())
    }

    async fn update_artifact_status(
        &self,
        item_id: &str,
        archiver: &str,
        update: ArtifactStatusUpdate,
    ) -> Result<()> {
        let Some(mut doc) = self.read_document(item_id).await? else {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "document for item '{item_id}'"
            ))));
        };

        let now = chrono::Utc::now().timestamp();
        let existing = doc.artifacts.get(archiver);

        // Monotonic: a terminal artifact never regresses to pending
        if update.status == crate::types::ArchiveStatus::Pending
            && existing.map(|a| a.status.is_terminal()).unwrap_or(false)
        {
            tracing::debug!(
                item_id,
                archiver,
                "Ignoring pending update over a terminal document artifact"
            );
            return Ok(());
        }

        let record = ArtifactRecord {
            archiver: archiver.to_string(),
            status: update.status,
            storage_uri: update
                .storage_uri
                .or_else(|| existing.and_then(|a| a.storage_uri.clone())),
            size_bytes: update
                .size_bytes
                .or_else(|| existing.and_then(|a| a.size_bytes)),
            compression_ratio: update
                .compression_ratio
                .or_else(|| existing.and_then(|a| a.compression_ratio)),
            updated_at: now,
        };
        doc.artifacts.insert(archiver.to_string(), record);

        self.write_document(&doc).await
    }

    async fn update_article_metadata(
        &self,
        item_id: &str,
        fields: serde_json::Value,
    ) -> Result<()> {
        let Some(mut doc) = self.read_document(item_id).await? else {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "document for item '{item_id}'"
            ))));
        };

        if let serde_json::Value::Object(map) = fields {
            for (key, value) in map {
                if key == "name" {
                    if let Some(name) = value.as_str() {
                        doc.name = Some(name.to_string());
                        continue;
                    }
                }
                doc.metadata.insert(key, value);
            }
        }

        self.write_document(&doc).await
    }
}

fn document_item_id(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}
