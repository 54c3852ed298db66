//! Submission paths: synchronous single-archiver runs and batch enqueueing.

use super::PageArchiver;
use crate::archivers::Archiver;
use crate::db::ArtifactResultParams;
use crate::types::{ArchiveResult, BatchItem, BatchSaveItem, BatchTask, Event, SaveRequest, SaveResponse, TaskAccepted};
use crate::utils::{extract_original_url, probe_url_status, rewrite_paywalled_url, sanitize_identifier};
use crate::{Error, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;

impl PageArchiver {
    /// Run one archiver (or all of them, sequentially) for a single URL
    ///
    /// This is the synchronous `/archive/{archiver}` path: each archiver gets
    /// a reachability pre-flight, a dedup check, and a full
    /// archive-with-storage run; a row is recorded per archiver. The response
    /// reflects the last archiver's outcome.
    pub async fn archive_now(
        &self,
        archiver_name: &str,
        request: SaveRequest,
    ) -> Result<SaveResponse> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let item_id = request.id.trim();
        if item_id.is_empty() {
            return Err(Error::Validation("id is required".into()));
        }
        let safe_id = sanitize_identifier(item_id);
        if safe_id.is_empty() {
            return Err(Error::Validation("id carries no usable characters".into()));
        }

        tracing::info!(
            archiver = archiver_name,
            item_id = %safe_id,
            url = %request.url,
            "Archive request received"
        );

        let archivers: Vec<Arc<dyn Archiver>> = if archiver_name == "all" {
            if self.registry.is_empty() {
                return Err(Error::Other("no archivers registered".into()));
            }
            self.registry.iter().cloned().collect()
        } else {
            vec![self
                .registry
                .get(archiver_name)
                .ok_or_else(|| Error::UnknownArchiver(archiver_name.to_string()))?]
        };

        let original_url = request.url.clone();
        let url = rewrite_paywalled_url(&original_url, &self.config.dedup.paywall);
        if url != original_url {
            tracing::info!(original = %original_url, rewritten = %url, "Rewriting URL for paywall bypass");
        }

        let mut last_result: Option<ArchiveResult> = None;
        let mut last_row_id: Option<i64> = None;

        for archiver in archivers {
            let name = archiver.name();
            tracing::info!(archiver = name, item_id = %safe_id, "Starting archiver run");

            // Unreachable policy: with retries off, a recorded 404 stays
            // terminal and the URL is not probed again (the admin requeue
            // resets the row and always probes afresh)
            if !self.config.dedup.retry_unreachable {
                if let Some(prior) = self.find_recorded_unreachable(&safe_id, &url, name).await {
                    tracing::info!(
                        archiver = name,
                        item_id = %safe_id,
                        "URL previously answered 404; reusing the recorded failure"
                    );
                    last_row_id = Some(prior.id);
                    last_result = Some(ArchiveResult::failed(Some(404)));
                    continue;
                }
            }

            // Reachability pre-flight: a 404 is recorded and not retried
            let status = probe_url_status(&self.http_client, &url).await;
            tracing::debug!(archiver = name, item_id = %safe_id, ?status, "URL status probe");
            if status == Some(404) {
                let rowid = self.record_unreachable(&safe_id, &url, name, request.name.as_deref()).await;
                last_row_id = rowid;
                last_result = Some(ArchiveResult::failed(Some(404)));
                continue;
            }

            // Dedup: reuse an existing successful artifact for this triple
            if self.config.dedup.skip_existing_saves {
                if let Some(existing) = self.find_existing_artifact(&safe_id, &url, name).await {
                    tracing::info!(
                        archiver = name,
                        item_id = %safe_id,
                        saved_path = existing.saved_path.as_deref(),
                        "Reusing existing artifact"
                    );
                    let url_id = crate::types::UrlId(existing.archived_url_id);
                    let rowid = self
                        .db
                        .insert_artifact_result(ArtifactResultParams {
                            archived_url_id: url_id,
                            archiver: name,
                            success: true,
                            exit_code: Some(0),
                            saved_path: existing.saved_path.as_deref(),
                            size_bytes: existing.size_bytes,
                            task_id: None,
                        })
                        .await?;
                    last_row_id = Some(rowid.0);
                    last_result = Some(ArchiveResult {
                        success: true,
                        exit_code: Some(0),
                        saved_path: existing.saved_path.clone(),
                        ..Default::default()
                    });

                    if name == "readability" {
                        self.notify_summarization(rowid.0, Some(existing.archived_url_id), "api-existing-readability");
                    }
                    continue;
                }
            }

            // Fresh run through the full pipeline
            let url_id = self
                .db
                .upsert_archived_url(&safe_id, &url, request.name.as_deref())
                .await?;
            let rowid = self.db.insert_pending_artifact(url_id, name, None).await?;
            self.emit_event(Event::ArchiveStarted {
                item_id: safe_id.clone(),
                archiver: name.to_string(),
            });

            let result = match self
                .pipeline
                .archive_with_storage(archiver.as_ref(), &url, &safe_id, url_id, rowid)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(archiver = name, item_id = %safe_id, error = %e, "Archiver run failed internally");
                    self.db
                        .finalize_artifact(rowid, false, Some(1), None, None)
                        .await?;
                    ArchiveResult::failed(Some(1))
                }
            };

            tracing::info!(
                archiver = name,
                item_id = %safe_id,
                success = result.success,
                exit_code = result.exit_code,
                saved_path = result.saved_path.as_deref(),
                "Archiver completed"
            );

            if result.success && name == "readability" {
                if let Some(metadata) = &result.metadata {
                    if let Err(e) = self.db.upsert_url_metadata(url_id, metadata).await {
                        tracing::error!(rowid = rowid.0, error = %e, "Failed to persist readability metadata");
                    }
                }
                self.notify_summarization(rowid.0, Some(url_id.0), "api-readability");
            }

            last_row_id = Some(rowid.0);
            last_result = Some(result);
        }

        let result = last_result.ok_or_else(|| Error::Other("no archiver executed".into()))?;

        Ok(SaveResponse {
            ok: result.success,
            exit_code: result.exit_code,
            saved_path: result.saved_path,
            id: safe_id,
            db_rowid: last_row_id,
        })
    }

    /// Enqueue a batch of items for asynchronous archiving
    ///
    /// One pending artifact row is inserted per `(item, archiver)` pair, in
    /// item-major order: for `archiver="all"` each item progresses through
    /// every archiver before the next item begins. Returns the opaque task id
    /// for status polling.
    pub async fn enqueue(
        &self,
        archiver_name: &str,
        items: Vec<BatchSaveItem>,
    ) -> Result<TaskAccepted> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let archiver_order: Vec<&'static str> = if archiver_name == "all" {
            self.registry.names()
        } else {
            let archiver = self
                .registry
                .get(archiver_name)
                .ok_or_else(|| Error::UnknownArchiver(archiver_name.to_string()))?;
            vec![archiver.name()]
        };

        let task_id = uuid::Uuid::new_v4().simple().to_string();
        let submitted = items.len();
        let mut batch_items: Vec<BatchItem> = Vec::new();

        for item in &items {
            let safe_id = sanitize_identifier(item.id.trim());
            if safe_id.is_empty() {
                return Err(Error::Validation("id is required for each item".into()));
            }
            let url = rewrite_paywalled_url(&item.url, &self.config.dedup.paywall);

            for archiver in &archiver_order {
                if self.config.dedup.skip_existing_saves
                    && self.find_existing_artifact(&safe_id, &url, archiver).await.is_some()
                {
                    tracing::debug!(
                        item_id = %safe_id,
                        archiver,
                        "Skipping pending row: already archived successfully"
                    );
                    continue;
                }

                // A recorded 404 already owns this triple's row; inserting a
                // pending row would wipe it just to fail the same way
                if !self.config.dedup.retry_unreachable
                    && self
                        .find_recorded_unreachable(&safe_id, &url, archiver)
                        .await
                        .is_some()
                {
                    tracing::debug!(
                        item_id = %safe_id,
                        archiver,
                        "Skipping pending row: URL previously answered 404"
                    );
                    continue;
                }

                let url_id = self
                    .db
                    .upsert_archived_url(&safe_id, &url, item.name.as_deref())
                    .await?;
                let rowid = self
                    .db
                    .insert_pending_artifact(url_id, archiver, Some(&task_id))
                    .await?;
                batch_items.push(BatchItem {
                    item_id: safe_id.clone(),
                    url: url.clone(),
                    rowid,
                    archiver_name: archiver.to_string(),
                });
            }
        }

        let job_count = batch_items.len();
        self.push_task(BatchTask {
            task_id: task_id.clone(),
            archiver_name: archiver_name.to_string(),
            items: batch_items,
        })
        .await?;

        self.ensure_processor_started();
        self.emit_event(Event::TaskQueued {
            task_id: task_id.clone(),
            count: job_count,
        });

        tracing::info!(task_id = %task_id, submitted, jobs = job_count, "Batch enqueued");

        Ok(TaskAccepted {
            task_id,
            count: submitted,
        })
    }

    /// Push a task onto the bounded queue
    async fn push_task(&self, task: BatchTask) -> Result<()> {
        let capacity = self.config.workers.queue_capacity;
        let mut queue = self.queue_state.queue.lock().await;
        if queue.len() >= capacity {
            return Err(Error::QueueFull { capacity });
        }
        queue.push_back(task);
        Ok(())
    }

    /// Dedup lookup trying the given URL and, for wrapper URLs, the original
    pub(crate) async fn find_existing_artifact(
        &self,
        item_id: &str,
        url: &str,
        archiver: &str,
    ) -> Option<crate::db::ArchiveArtifact> {
        match self.db.find_successful_artifact(item_id, url, archiver).await {
            Ok(Some(artifact)) => return Some(artifact),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(item_id, archiver, error = %e, "Dedup lookup failed");
                return None;
            }
        }

        // Wrapper URLs carry the real URL as a path suffix; try that form too
        let original = extract_original_url(url, &self.config.dedup.paywall)?;
        match self
            .db
            .find_successful_artifact(item_id, &original, archiver)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(item_id, archiver, error = %e, "Dedup lookup failed");
                None
            }
        }
    }

    /// Lookup of a recorded 404 pre-flight failure for the exact triple
    pub(crate) async fn find_recorded_unreachable(
        &self,
        item_id: &str,
        url: &str,
        archiver: &str,
    ) -> Option<crate::db::ArchiveArtifact> {
        match self
            .db
            .find_unreachable_artifact(item_id, url, archiver)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(item_id, archiver, error = %e, "Unreachable lookup failed");
                None
            }
        }
    }

    /// Record a 404 pre-flight failure row; best-effort
    pub(crate) async fn record_unreachable(
        &self,
        item_id: &str,
        url: &str,
        archiver: &str,
        name: Option<&str>,
    ) -> Option<i64> {
        tracing::info!(item_id, url, archiver, "URL responded 404");
        let url_id = match self.db.upsert_archived_url(item_id, url, name).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(item_id, error = %e, "Failed to record unreachable URL");
                return None;
            }
        };
        match self
            .db
            .insert_artifact_result(ArtifactResultParams {
                archived_url_id: url_id,
                archiver,
                success: false,
                exit_code: Some(404),
                saved_path: None,
                size_bytes: None,
                task_id: None,
            })
            .await
        {
            Ok(rowid) => Some(rowid.0),
            Err(e) => {
                tracing::error!(item_id, error = %e, "Failed to record 404 failure row");
                None
            }
        }
    }

    /// Fire the summarization notifier, if one is configured
    pub(crate) fn notify_summarization(
        &self,
        rowid: i64,
        archived_url_id: Option<i64>,
        reason: &str,
    ) {
        if let Some(notifier) = &self.summarization {
            if notifier.schedule(rowid, archived_url_id, reason) {
                tracing::info!(rowid, reason, "Scheduled summarization");
            }
        }
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        !self.queue_state.accepting_new.load(Ordering::SeqCst)
    }
}
