//! Queue processor and per-item worker loop.

use super::PageArchiver;
use crate::types::{ArtifactId, BatchItem, BatchTask, Event, UrlId};
use crate::utils::probe_url_status;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Interval between queue polls when the queue is empty
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl PageArchiver {
    /// Spin up the queue processor on first enqueue (idempotent, never shrunk)
    pub(crate) fn ensure_processor_started(&self) {
        if self.queue_state.processor_started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.start_queue_processor();
    }

    /// Start the queue processor task
    ///
    /// The processor continuously pops batch tasks and spawns one job per
    /// task under the worker-count semaphore. Parallelism is between tasks;
    /// items within a task run sequentially, and the subprocess step is
    /// globally serialized by the command runner anyway, so extra workers
    /// mostly overlap storage I/O with catalog writes.
    fn start_queue_processor(&self) -> tokio::task::JoinHandle<()> {
        let archiver = self.clone();
        tokio::spawn(async move {
            tracing::info!("Queue processor started");
            loop {
                if archiver.shutdown.is_cancelled() {
                    tracing::debug!("Queue processor stopping");
                    break;
                }

                let task = {
                    let mut queue = archiver.queue_state.queue.lock().await;
                    queue.pop_front()
                };

                match task {
                    Some(task) => {
                        let permit = match archiver
                            .queue_state
                            .worker_limit
                            .clone()
                            .acquire_owned()
                            .await
                        {
                            Ok(permit) => permit,
                            Err(_) => break,
                        };

                        archiver
                            .queue_state
                            .active_tasks
                            .fetch_add(1, Ordering::SeqCst);
                        let worker = archiver.clone();
                        tokio::spawn(async move {
                            let _permit = permit;
                            worker.process_batch_task(task).await;
                            worker
                                .queue_state
                                .active_tasks
                                .fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                    None => {
                        tokio::time::sleep(QUEUE_POLL_INTERVAL).await;
                    }
                }
            }
        })
    }

    /// Process one batch task: items strictly in insertion order
    ///
    /// Every path finalizes the item's pending row; the worker never
    /// re-throws, so the task status endpoint always resolves.
    pub(crate) async fn process_batch_task(&self, task: BatchTask) {
        tracing::info!(
            task_id = %task.task_id,
            items = task.items.len(),
            "Processing batch task"
        );

        for item in &task.items {
            self.process_batch_item(item).await;
        }

        self.emit_event(Event::TaskCompleted {
            task_id: task.task_id.clone(),
        });
        tracing::info!(task_id = %task.task_id, "Batch task complete");
    }

    /// One item of the worker loop
    async fn process_batch_item(&self, item: &BatchItem) {
        // 1. Resolve the archiver; unknown names finalize with 127
        let Some(archiver) = self.registry.get(&item.archiver_name) else {
            tracing::warn!(
                archiver = %item.archiver_name,
                item_id = %item.item_id,
                "Unknown archiver; finalizing with exit code 127"
            );
            self.finalize_quietly(item.rowid, false, Some(127), None, None)
                .await;
            return;
        };

        // 2. Execution-time dedup: another worker or an earlier task may have
        //    completed this triple since submission
        if self.config.dedup.skip_existing_saves {
            if let Some(existing) = self
                .find_existing_artifact(&item.item_id, &item.url, &item.archiver_name)
                .await
            {
                if existing.id != item.rowid.0 {
                    tracing::info!(
                        item_id = %item.item_id,
                        archiver = %item.archiver_name,
                        "Promoting existing artifact into the pending row"
                    );
                    self.finalize_quietly(
                        item.rowid,
                        true,
                        Some(0),
                        existing.saved_path.as_deref(),
                        existing.size_bytes,
                    )
                    .await;
                    return;
                }
            }
        }

        // 3. Reachability pre-flight: 404 short-circuits the archiver
        let status = probe_url_status(&self.http_client, &item.url).await;
        if status == Some(404) {
            tracing::info!(
                item_id = %item.item_id,
                url = %item.url,
                archiver = %item.archiver_name,
                "URL responded 404; skipping archiver"
            );
            self.finalize_quietly(item.rowid, false, Some(404), None, None)
                .await;
            return;
        }

        let Some(url_id) = self.item_url_id(item.rowid).await else {
            self.finalize_quietly(item.rowid, false, Some(1), None, None)
                .await;
            return;
        };

        // 4. The full archive-with-storage pipeline; internal failures
        //    finalize as exit code 1 and never escape the worker
        self.emit_event(Event::ArchiveStarted {
            item_id: item.item_id.clone(),
            archiver: item.archiver_name.clone(),
        });

        let result = match self
            .pipeline
            .archive_with_storage(archiver.as_ref(), &item.url, &item.item_id, url_id, item.rowid)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    item_id = %item.item_id,
                    archiver = %item.archiver_name,
                    error = %e,
                    "Worker caught internal failure"
                );
                self.finalize_quietly(item.rowid, false, Some(1), None, None)
                    .await;
                return;
            }
        };

        // 5. Persist extracted metadata (best-effort)
        if result.success {
            if let Some(metadata) = &result.metadata {
                if let Err(e) = self.db.upsert_url_metadata(url_id, metadata).await {
                    tracing::error!(
                        item_id = %item.item_id,
                        error = %e,
                        "Failed to persist readability metadata"
                    );
                }
            }
        }

        // 6. Summarization notification for completed readability artifacts
        if result.success && item.archiver_name == "readability" {
            self.notify_summarization(item.rowid.0, Some(url_id.0), "worker-readability");
        }
    }

    /// The owning archived URL of a pending row
    async fn item_url_id(&self, rowid: ArtifactId) -> Option<UrlId> {
        match self.db.get_artifact_by_id(rowid).await {
            Ok(Some(artifact)) => Some(UrlId(artifact.archived_url_id)),
            Ok(None) => {
                tracing::error!(rowid = rowid.0, "Pending row vanished before processing");
                None
            }
            Err(e) => {
                tracing::error!(rowid = rowid.0, error = %e, "Failed to load pending row");
                None
            }
        }
    }

    /// Finalize a row, logging (never propagating) catalog errors
    async fn finalize_quietly(
        &self,
        rowid: ArtifactId,
        success: bool,
        exit_code: Option<i32>,
        saved_path: Option<&str>,
        size_bytes: Option<i64>,
    ) {
        if let Err(e) = self
            .db
            .finalize_artifact(rowid, success, exit_code, saved_path, size_bytes)
            .await
        {
            tracing::error!(rowid = rowid.0, error = %e, "Failed to finalize artifact row");
        }
    }
}
