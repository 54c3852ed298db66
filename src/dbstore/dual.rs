//! Dual provider: write-through fan-out to a primary and a replica.

use super::{
    ArtifactRecord, ArtifactStatusUpdate, ArticleRecord, DatabaseStorageProvider, NewArticle,
    replica_failure_propagates,
};
use crate::config::DualWriteFailureMode;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Write-through pair of database storage providers
///
/// Writes go to the primary first, then the replica; reads are served from
/// the primary only. In `strict` mode a replica failure propagates to the
/// caller; in `best_effort` it is logged and swallowed, which lets a mobile-
/// facing denormalized store trail the transactional catalog.
pub struct DualStorage {
    primary: Arc<dyn DatabaseStorageProvider>,
    replica: Arc<dyn DatabaseStorageProvider>,
    failure_mode: DualWriteFailureMode,
}

impl DualStorage {
    /// Pair a primary with a replica
    pub fn new(
        primary: Arc<dyn DatabaseStorageProvider>,
        replica: Arc<dyn DatabaseStorageProvider>,
        failure_mode: DualWriteFailureMode,
    ) -> Self {
        Self {
            primary,
            replica,
            failure_mode,
        }
    }

    fn handle_replica_result(&self, operation: &str, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if replica_failure_propagates(self.failure_mode) => {
                Err(Error::ReplicaWrite(format!(
                    "{operation} on {}: {e}",
                    self.replica.provider_name()
                )))
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    replica = self.replica.provider_name(),
                    error = %e,
                    "Replica write failed (best-effort mode, swallowed)"
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl DatabaseStorageProvider for DualStorage {
    fn provider_name(&self) -> &'static str {
        "dual"
    }

    async fn create_article(&self, article: NewArticle<'_>) -> Result<()> {
        self.primary.create_article(article.clone()).await?;
        let replica_result = self.replica.create_article(article).await;
        self.handle_replica_result("create_article", replica_result)
    }

    async fn get_article(&self, item_id: &str) -> Result<Option<ArticleRecord>> {
        self.primary.get_article(item_id).await
    }

    async fn get_artifact(&self, item_id: &str, archiver: &str) -> Result<Option<ArtifactRecord>> {
        self.primary.get_artifact(item_id, archiver).await
    }

    async fn list_artifacts(&self, item_id: &str) -> Result<Vec<ArtifactRecord>> {
        self.primary.list_artifacts(item_id).await
    }

    async fn list_articles(&self, limit: i64, offset: i64) -> Result<Vec<ArticleRecord>> {
        self.primary.list_articles(limit, offset).await
    }

    async fn update_artifact_status(
        &self,
        item_id: &str,
        archiver: &str,
        update: ArtifactStatusUpdate,
    ) -> Result<()> {
        self.primary
            .update_artifact_status(item_id, archiver, update.clone())
            .await?;
        let replica_result = self
            .replica
            .update_artifact_status(item_id, archiver, update)
            .await;
        self.handle_replica_result("update_artifact_status", replica_result)
    }

    async fn update_article_metadata(
        &self,
        item_id: &str,
        fields: serde_json::Value,
    ) -> Result<()> {
        self.primary
            .update_article_metadata(item_id, fields.clone())
            .await?;
        let replica_result = self.replica.update_article_metadata(item_id, fields).await;
        self.handle_replica_result("update_article_metadata", replica_result)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbstore::test_support::FailingStorage;
    use crate::dbstore::DocumentStorage;
    use crate::types::ArchiveStatus;
    use tempfile::TempDir;

    async fn document_provider(dir: &TempDir) -> Arc<dyn DatabaseStorageProvider> {
        Arc::new(
            DocumentStorage::new(dir.path().to_path_buf())
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn writes_reach_both_sides() {
        let primary_dir = TempDir::new().unwrap();
        let replica_dir = TempDir::new().unwrap();
        let primary = document_provider(&primary_dir).await;
        let replica = document_provider(&replica_dir).await;
        let dual = DualStorage::new(primary.clone(), replica.clone(), DualWriteFailureMode::Strict);

        dual.create_article(NewArticle {
            item_id: "item-a",
            url: "https://example.org/x",
            name: None,
        })
        .await
        .unwrap();
        dual.update_artifact_status(
            "item-a",
            "pdf",
            ArtifactStatusUpdate {
                status: ArchiveStatus::Success,
                size_bytes: Some(7),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(primary.get_article("item-a").await.unwrap().is_some());
        assert!(replica.get_article("item-a").await.unwrap().is_some());
        assert!(
            replica
                .get_artifact("item-a", "pdf")
                .await
                .unwrap()
                .is_some(),
            "artifact updates must fan out to the replica"
        );
    }

    #[tokio::test]
    async fn strict_mode_propagates_replica_failure() {
        let primary_dir = TempDir::new().unwrap();
        let primary = document_provider(&primary_dir).await;
        let dual = DualStorage::new(
            primary.clone(),
            Arc::new(FailingStorage),
            DualWriteFailureMode::Strict,
        );

        let result = dual
            .create_article(NewArticle {
                item_id: "item-a",
                url: "https://example.org/x",
                name: None,
            })
            .await;

        assert!(matches!(result, Err(Error::ReplicaWrite(_))));
        assert!(
            primary.get_article("item-a").await.unwrap().is_some(),
            "the primary write still happened before the replica failed"
        );
    }

    #[tokio::test]
    async fn best_effort_mode_swallows_replica_failure() {
        let primary_dir = TempDir::new().unwrap();
        let primary = document_provider(&primary_dir).await;
        let dual = DualStorage::new(
            primary.clone(),
            Arc::new(FailingStorage),
            DualWriteFailureMode::BestEffort,
        );

        dual.create_article(NewArticle {
            item_id: "item-a",
            url: "https://example.org/x",
            name: None,
        })
        .await
        .expect("best-effort mode must swallow replica failures");

        assert!(primary.get_article("item-a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reads_come_from_the_primary() {
        let primary_dir = TempDir::new().unwrap();
        let replica_dir = TempDir::new().unwrap();
        let primary = document_provider(&primary_dir).await;
        let replica = document_provider(&replica_dir).await;

        // Seed only the replica: dual reads must not see it
        replica
            .create_article(NewArticle {
                item_id: "replica-only",
                url: "https://example.org/r",
                name: None,
            })
            .await
            .unwrap();

        let dual = DualStorage::new(primary, replica, DualWriteFailureMode::BestEffort);
        assert!(
            dual.get_article("replica-only").await.unwrap().is_none(),
            "reads are served from the primary"
        );
    }

    #[tokio::test]
    async fn primary_failure_always_propagates() {
        let replica_dir = TempDir::new().unwrap();
        let replica = document_provider(&replica_dir).await;
        let dual = DualStorage::new(
            Arc::new(FailingStorage),
            replica,
            DualWriteFailureMode::BestEffort,
        );

        let result = dual
            .create_article(NewArticle {
                item_id: "item-a",
                url: "https://example.org/x",
                name: None,
            })
            .await;
        assert!(
            result.is_err(),
            "failure mode only governs the replica; primary errors always surface"
        );
    }
}
