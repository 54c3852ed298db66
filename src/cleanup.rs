//! Deferred local cleanup scheduler
//!
//! Artifacts whose uploads all succeeded are eligible to have their local
//! files removed once a retention window elapses. The scheduler tracks
//! `(path, artifact_id, eligible_at)` entries, re-checks catalog eligibility
//! on every scan (a requeue may have cleared promotion in the meantime), and
//! retries failed deletions on the next scan rather than dropping them.

use crate::config::CleanupConfig;
use crate::db::Database;
use crate::types::{ArtifactId, Event};
use crate::utils::prune_empty_parents;
use crate::Result;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// One tracked cleanup candidate
#[derive(Debug, Clone)]
struct CleanupEntry {
    path: PathBuf,
    artifact_id: ArtifactId,
    /// Unix timestamp after which the file may be removed
    eligible_at: i64,
}

/// Background coordinator for deferred local file removal
#[derive(Clone)]
pub struct CleanupScheduler {
    db: Arc<Database>,
    data_dir: PathBuf,
    config: CleanupConfig,
    entries: Arc<Mutex<Vec<CleanupEntry>>>,
    event_tx: broadcast::Sender<Event>,
}

impl CleanupScheduler {
    /// Create a scheduler (does not start scanning; see [`Self::start`])
    pub fn new(
        db: Arc<Database>,
        data_dir: PathBuf,
        config: CleanupConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            db,
            data_dir,
            config,
            entries: Arc::new(Mutex::new(Vec::new())),
            event_tx,
        }
    }

    /// Register a local artifact file for deferred removal
    ///
    /// No-op when cleanup is disabled. The caller guarantees the artifact is
    /// fully promoted; eligibility is re-verified against the catalog at
    /// deletion time anyway.
    pub fn schedule(&self, path: PathBuf, artifact_id: ArtifactId, retention_hours: u64) {
        if !self.config.enable_local_cleanup {
            return;
        }
        let eligible_at = chrono::Utc::now().timestamp() + (retention_hours as i64) * 3600;

        tracing::debug!(
            artifact_id = artifact_id.0,
            path = %path.display(),
            eligible_at,
            "Scheduled local cleanup"
        );

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        // Re-scheduling an artifact replaces its entry
        entries.retain(|e| e.artifact_id != artifact_id);
        entries.push(CleanupEntry {
            path,
            artifact_id,
            eligible_at,
        });
    }

    /// Number of tracked entries (observable for tests and diagnostics)
    pub fn tracked(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Re-register promoted-but-not-deleted artifacts from the catalog
    ///
    /// Called at startup so a restart does not orphan local files that were
    /// awaiting their retention window.
    pub async fn restore_from_catalog(&self) -> Result<usize> {
        if !self.config.enable_local_cleanup {
            return Ok(0);
        }

        let candidates = self.db.list_cleanup_candidates().await?;
        let count = candidates.len();
        for (artifact_id, path) in candidates {
            self.schedule(
                PathBuf::from(path),
                artifact_id,
                self.config.local_workspace_retention_hours,
            );
        }

        if count > 0 {
            tracing::info!(count, "Restored cleanup candidates from catalog");
        }
        Ok(count)
    }

    /// Spawn the periodic scan loop; stops when `shutdown` is cancelled
    pub fn start(&self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.config.scan_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.scan().await;
                    }
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Cleanup scheduler stopping");
                        break;
                    }
                }
            }
        })
    }

    /// One scan pass over the tracked entries
    ///
    /// Public so tests (and operators embedding the library) can force a pass
    /// without waiting for the interval.
    pub async fn scan(&self) {
        let now = chrono::Utc::now().timestamp();
        let due: Vec<CleanupEntry> = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let (due, keep): (Vec<_>, Vec<_>) =
                entries.drain(..).partition(|e| e.eligible_at <= now);
            *entries = keep;
            due
        };

        for entry in due {
            if let Some(retry) = self.process_entry(entry).await {
                let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
                entries.push(retry);
            }
        }
    }

    /// Delete one entry's file; returns the entry when it should be retried
    async fn process_entry(&self, entry: CleanupEntry) -> Option<CleanupEntry> {
        // Re-check catalog eligibility: requeue clears promotion, admin
        // delete removes the row entirely
        let artifact = match self.db.get_artifact_by_id(entry.artifact_id).await {
            Ok(Some(artifact)) => artifact,
            Ok(None) => {
                tracing::debug!(
                    artifact_id = entry.artifact_id.0,
                    "Dropping cleanup entry for a deleted artifact"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    artifact_id = entry.artifact_id.0,
                    error = %e,
                    "Cleanup eligibility check failed; retrying next scan"
                );
                return Some(entry);
            }
        };

        if artifact.local_file_deleted {
            return None;
        }
        if !artifact.all_uploads_succeeded {
            tracing::debug!(
                artifact_id = entry.artifact_id.0,
                "Dropping cleanup entry: artifact is no longer fully promoted"
            );
            return None;
        }

        match tokio::fs::remove_file(&entry.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Someone beat us to it; still record the deletion
            }
            Err(e) => {
                tracing::warn!(
                    artifact_id = entry.artifact_id.0,
                    path = %entry.path.display(),
                    error = %e,
                    "Local cleanup failed; retrying next scan"
                );
                return Some(entry);
            }
        }

        prune_empty_parents(&entry.path, &self.data_dir);

        match self.db.mark_local_file_deleted(entry.artifact_id).await {
            Ok(true) => {
                tracing::info!(
                    artifact_id = entry.artifact_id.0,
                    path = %entry.path.display(),
                    "Removed local artifact after retention window"
                );
                self.event_tx
                    .send(Event::LocalFileCleaned {
                        artifact_id: entry.artifact_id,
                        path: entry.path.display().to_string(),
                    })
                    .ok();
                None
            }
            Ok(false) => {
                tracing::warn!(
                    artifact_id = entry.artifact_id.0,
                    "Catalog refused the local-file-deleted mark"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    artifact_id = entry.artifact_id.0,
                    error = %e,
                    "Failed to record local file deletion; retrying next scan"
                );
                Some(entry)
            }
        }
    }
}
