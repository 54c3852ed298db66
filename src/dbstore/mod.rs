//! Database storage providers
//!
//! The kernel records article/artifact state through this abstraction so a
//! deployment can mirror the transactional catalog into a denormalized
//! document store for mobile-facing reads. Variants:
//!
//! - [`RelationalStorage`] — wraps the sqlx catalog (the source of truth)
//! - [`DocumentStorage`] — per-item JSON documents with embedded artifacts
//! - [`DualStorage`] — write-through fan-out with a configurable failure mode

use crate::config::{Config, DualWriteFailureMode};
use crate::db::Database;
use crate::types::ArchiveStatus;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod document;
mod dual;
mod relational;

pub use document::DocumentStorage;
pub use dual::DualStorage;
pub use relational::RelationalStorage;

/// A new article to record
#[derive(Debug, Clone)]
pub struct NewArticle<'a> {
    /// Sanitized item identifier
    pub item_id: &'a str,
    /// Archived URL
    pub url: &'a str,
    /// Optional display name
    pub name: Option<&'a str>,
}

/// Article record as seen through a database storage provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Sanitized item identifier
    pub item_id: String,
    /// Archived URL
    pub url: String,
    /// Optional display name
    pub name: Option<String>,
    /// Total size across successful artifacts
    pub total_size_bytes: Option<i64>,
    /// Free-form metadata fields (document store only)
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Unix timestamp of creation
    pub created_at: i64,
}

/// Artifact state as seen through a database storage provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Archiver name
    pub archiver: String,
    /// Lifecycle status
    pub status: ArchiveStatus,
    /// Storage URI of the uploaded object, when known
    pub storage_uri: Option<String>,
    /// Artifact size in bytes
    pub size_bytes: Option<i64>,
    /// Compression ratio of the stored object
    pub compression_ratio: Option<f64>,
    /// Unix timestamp of the last update
    pub updated_at: i64,
}

/// Status update applied to one artifact
#[derive(Debug, Clone, Default)]
pub struct ArtifactStatusUpdate {
    /// New lifecycle status
    pub status: ArchiveStatus,
    /// Storage URI of the uploaded object
    pub storage_uri: Option<String>,
    /// Artifact size in bytes
    pub size_bytes: Option<i64>,
    /// Compression ratio of the stored object
    pub compression_ratio: Option<f64>,
}

/// Article/artifact CRUD and status transitions
///
/// `update_artifact_status` is monotonic: implementations never replace a
/// terminal status with `pending`.
#[async_trait]
pub trait DatabaseStorageProvider: Send + Sync {
    /// Stable provider identifier
    fn provider_name(&self) -> &'static str;

    /// Record an article; idempotent on `item_id`
    async fn create_article(&self, article: NewArticle<'_>) -> Result<()>;

    /// Fetch an article by item id
    async fn get_article(&self, item_id: &str) -> Result<Option<ArticleRecord>>;

    /// Fetch one artifact's state
    async fn get_artifact(&self, item_id: &str, archiver: &str) -> Result<Option<ArtifactRecord>>;

    /// All artifacts of an article
    async fn list_artifacts(&self, item_id: &str) -> Result<Vec<ArtifactRecord>>;

    /// Paginated article listing, newest first
    async fn list_articles(&self, limit: i64, offset: i64) -> Result<Vec<ArticleRecord>>;

    /// Apply a status update to one artifact (monotonic with respect to `pending`)
    async fn update_artifact_status(
        &self,
        item_id: &str,
        archiver: &str,
        update: ArtifactStatusUpdate,
    ) -> Result<()>;

    /// Merge free-form metadata fields into an article
    async fn update_article_metadata(
        &self,
        item_id: &str,
        fields: serde_json::Value,
    ) -> Result<()>;
}

/// Build the configured database storage provider
///
/// The relational catalog is always the primary; dual persistence layers the
/// document store on top as a replica.
pub async fn build_provider(
    config: &Config,
    db: Arc<Database>,
) -> Result<Arc<dyn DatabaseStorageProvider>> {
    let relational: Arc<dyn DatabaseStorageProvider> = Arc::new(RelationalStorage::new(db));

    if !config.persistence.enable_dual_persistence {
        return Ok(relational);
    }

    let dir = config
        .persistence
        .resolved_document_store_dir(config.data_dir());
    let document: Arc<dyn DatabaseStorageProvider> =
        Arc::new(DocumentStorage::new(dir).await?);

    Ok(Arc::new(DualStorage::new(
        relational,
        document,
        config.persistence.dual_write_failure_mode,
    )))
}

/// Whether a replica failure should propagate under the given mode
pub(crate) fn replica_failure_propagates(mode: DualWriteFailureMode) -> bool {
    matches!(mode, DualWriteFailureMode::Strict)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Replica whose writes always fail, for dual-mode tests
    pub(crate) struct FailingStorage;

    #[async_trait]
    impl DatabaseStorageProvider for FailingStorage {
        fn provider_name(&self) -> &'static str {
            "failing"
        }

        async fn create_article(&self, _article: NewArticle<'_>) -> Result<()> {
            Err(crate::Error::Other("induced replica failure".into()))
        }

        async fn get_article(&self, _item_id: &str) -> Result<Option<ArticleRecord>> {
            Err(crate::Error::Other("induced replica failure".into()))
        }

        async fn get_artifact(
            &self,
            _item_id: &str,
            _archiver: &str,
        ) -> Result<Option<ArtifactRecord>> {
            Err(crate::Error::Other("induced replica failure".into()))
        }

        async fn list_artifacts(&self, _item_id: &str) -> Result<Vec<ArtifactRecord>> {
            Err(crate::Error::Other("induced replica failure".into()))
        }

        async fn list_articles(&self, _limit: i64, _offset: i64) -> Result<Vec<ArticleRecord>> {
            Err(crate::Error::Other("induced replica failure".into()))
        }

        async fn update_artifact_status(
            &self,
            _item_id: &str,
            _archiver: &str,
            _update: ArtifactStatusUpdate,
        ) -> Result<()> {
            Err(crate::Error::Other("induced replica failure".into()))
        }

        async fn update_article_metadata(
            &self,
            _item_id: &str,
            _fields: serde_json::Value,
        ) -> Result<()> {
            Err(crate::Error::Other("induced replica failure".into()))
        }
    }
}
