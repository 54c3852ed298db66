//! Archival orchestration kernel split into focused submodules.
//!
//! The `PageArchiver` struct and its methods are organized by domain:
//! - [`submit`] - Synchronous archive runs and batch enqueueing
//! - [`worker`] - Queue processor and per-item worker loop
//! - [`status`] - Task status aggregation
//! - [`retrieve`] - Artifact retrieval (single file or tarball bundle)
//! - [`admin`] - Admin listing, deletion, requeue, re-summarize
//! - [`lifecycle`] - Startup restore and graceful shutdown

mod admin;
mod lifecycle;
mod retrieve;
mod status;
mod submit;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod tests;

pub use retrieve::RetrievedArtifact;

use crate::archivers::pipeline::ArchivePipeline;
use crate::archivers::ArchiverRegistry;
use crate::cleanup::CleanupScheduler;
use crate::command_runner::CommandRunner;
use crate::config::{Config, ServiceRole};
use crate::db::Database;
use crate::dbstore::DatabaseStorageProvider;
use crate::storage::FileStorageProvider;
use crate::summarization::{SummarizationNotifier, WebhookSummarizationNotifier};
use crate::types::{BatchTask, Event};
use crate::Result;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

/// Task queue and worker pool state
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Bounded FIFO of batch tasks (capacity enforced at enqueue)
    pub(crate) queue: Arc<Mutex<VecDeque<BatchTask>>>,
    /// Limits the number of concurrently processed tasks
    pub(crate) worker_limit: Arc<Semaphore>,
    /// Number of tasks currently being processed (for drain/idle checks)
    pub(crate) active_tasks: Arc<std::sync::atomic::AtomicUsize>,
    /// Set once the queue processor has been spun up (lazy start, never shrunk)
    pub(crate) processor_started: Arc<AtomicBool>,
    /// Cleared during shutdown so new submissions are rejected
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl QueueState {
    fn new(workers: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            worker_limit: Arc::new(Semaphore::new(workers.max(1))),
            active_tasks: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            processor_started: Arc::new(AtomicBool::new(false)),
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Main archival orchestrator (cloneable - all fields are Arc-wrapped)
///
/// The composition root: owns the catalog, the archiver registry, the
/// storage fan-out, the worker pool, the cleanup scheduler, and the optional
/// summarization notifier. All cross-worker coordination flows through the
/// catalog, never through in-memory shared state.
#[derive(Clone)]
pub struct PageArchiver {
    /// Catalog handle (public for embedders and integration tests)
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration (threaded from here to every component, no globals)
    pub(crate) config: Arc<Config>,
    /// Serialized subprocess runner shared by all archivers
    pub(crate) command_runner: CommandRunner,
    /// Construction-time immutable archiver registry
    pub(crate) registry: Arc<ArchiverRegistry>,
    /// Archive-with-storage pipeline
    pub(crate) pipeline: ArchivePipeline,
    /// Database storage provider (relational, or dual with a document replica)
    pub(crate) db_storage: Arc<dyn DatabaseStorageProvider>,
    /// File storage fan-out, in configuration order
    pub(crate) file_storage: Arc<Vec<Arc<dyn FileStorageProvider>>>,
    /// Deferred local cleanup scheduler
    pub(crate) cleanup: CleanupScheduler,
    /// Optional summarization collaborator (absent in worker-only role)
    pub(crate) summarization: Option<Arc<dyn SummarizationNotifier>>,
    /// HTTP client for reachability probes
    pub(crate) http_client: reqwest::Client,
    /// Task queue and worker pool state
    pub(crate) queue_state: QueueState,
    /// Cancelled on shutdown; background loops watch it
    pub(crate) shutdown: CancellationToken,
}

impl PageArchiver {
    /// Create a new PageArchiver instance
    ///
    /// This initializes all core components:
    /// - Creates the data directory and opens the catalog (running migrations)
    /// - Builds the archiver registry from the configured list
    /// - Builds the storage provider fan-out and database storage provider
    /// - Restores cleanup candidates from the catalog and starts the
    ///   cleanup scan loop
    pub async fn new(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(config.data_dir()).await.map_err(|e| {
            crate::Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    config.data_dir().display(),
                    e
                ),
            ))
        })?;

        let db = Arc::new(Database::new(config.database_path()).await?);
        let config_arc = Arc::new(config);

        // Broadcast channel sized for bursty batch completion chatter
        let (event_tx, _rx) = broadcast::channel(1024);

        let command_runner = CommandRunner::new(db.clone(), false);
        let registry = Arc::new(ArchiverRegistry::from_config(&config_arc, &command_runner)?);

        let file_storage = Arc::new(crate::storage::build_providers(&config_arc).await?);
        let db_storage = crate::dbstore::build_provider(&config_arc, db.clone()).await?;

        let cleanup = CleanupScheduler::new(
            db.clone(),
            config_arc.data_dir().clone(),
            config_arc.cleanup.clone(),
            event_tx.clone(),
        );

        let summarization: Option<Arc<dyn SummarizationNotifier>> =
            match config_arc.service_role {
                ServiceRole::Full => {
                    WebhookSummarizationNotifier::from_config(&config_arc.summarization)
                        .map(|n| Arc::new(n) as Arc<dyn SummarizationNotifier>)
                }
                ServiceRole::ArchiverWorker => {
                    tracing::info!("Worker role: skipping summarization bootstrap");
                    None
                }
            };

        let pipeline = ArchivePipeline::new(
            config_arc.clone(),
            db.clone(),
            file_storage.clone(),
            db_storage.clone(),
            cleanup.clone(),
            event_tx.clone(),
        );

        let shutdown = CancellationToken::new();
        let queue_state = QueueState::new(config_arc.workers.workers);

        let archiver = Self {
            db,
            event_tx,
            config: config_arc,
            command_runner,
            registry: registry.clone(),
            pipeline,
            db_storage,
            file_storage,
            cleanup: cleanup.clone(),
            summarization,
            http_client: reqwest::Client::new(),
            queue_state,
            shutdown: shutdown.clone(),
        };

        tracing::info!(
            archivers = ?registry.names(),
            providers = archiver.file_storage.len(),
            db_storage = archiver.db_storage.provider_name(),
            "Page archiver initialized"
        );

        // Restore deferred-cleanup state left over from a previous run
        if let Err(e) = cleanup.restore_from_catalog().await {
            tracing::warn!(error = %e, "Failed to restore cleanup candidates");
        }
        cleanup.start(shutdown.child_token());

        Ok(archiver)
    }

    /// Subscribe to archival events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls behind the channel buffer
    /// observes a `Lagged` error and can resubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration (cheap Arc clone)
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Names of the registered archivers, in registration order
    pub fn archiver_names(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    /// The command runner, for replaying past executions
    pub fn command_runner(&self) -> &CommandRunner {
        &self.command_runner
    }

    /// Emit an event to all subscribers (dropped silently when none listen)
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let archiver = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(archiver, config).await })
    }
}
