//! Shared test helpers for building PageArchiver instances without real
//! browser binaries.

use crate::archivers::pipeline::ArchivePipeline;
use crate::archivers::{Archiver, ArchiverRegistry};
use crate::cleanup::CleanupScheduler;
use crate::command_runner::{CommandRequest, CommandRunner};
use crate::config::Config;
use crate::db::Database;
use crate::dbstore::RelationalStorage;
use crate::orchestrator::{PageArchiver, QueueState};
use crate::storage::test_support::MemoryProvider;
use crate::storage::FileStorageProvider;
use crate::summarization::test_support::RecordingNotifier;
use crate::summarization::SummarizationNotifier;
use crate::types::ArchiveResult;
use crate::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// What a stub archiver does when invoked
enum StubBehavior {
    /// Write `content` to the standard output path and succeed
    Ok(&'static str),
    /// Fail with the given exit code, producing no file
    Fail(i32),
    /// Return an internal error (exercises the worker's exception boundary)
    Error,
}

/// Archiver test double that writes (or refuses to write) an artifact file
pub(crate) struct StubArchiver {
    name: &'static str,
    extension: &'static str,
    behavior: StubBehavior,
    data_dir: Mutex<Option<PathBuf>>,
    invocations: AtomicUsize,
}

impl StubArchiver {
    pub(crate) fn ok(name: &'static str, extension: &'static str) -> Self {
        Self {
            name,
            extension,
            behavior: StubBehavior::Ok("<html>ok</html>"),
            data_dir: Mutex::new(None),
            invocations: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(name: &'static str, extension: &'static str, exit_code: i32) -> Self {
        Self {
            name,
            extension,
            behavior: StubBehavior::Fail(exit_code),
            data_dir: Mutex::new(None),
            invocations: AtomicUsize::new(0),
        }
    }

    pub(crate) fn erroring(name: &'static str, extension: &'static str) -> Self {
        Self {
            name,
            extension,
            behavior: StubBehavior::Error,
            data_dir: Mutex::new(None),
            invocations: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_data_dir(self, data_dir: PathBuf) -> Self {
        *self.data_dir.lock().unwrap() = Some(data_dir);
        self
    }

    pub(crate) fn set_data_dir(&self, data_dir: PathBuf) {
        *self.data_dir.lock().unwrap() = Some(data_dir);
    }

    /// How many times `archive` ran (the dedup scenarios assert on this)
    pub(crate) fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Archiver for StubArchiver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn output_extension(&self) -> &'static str {
        self.extension
    }

    async fn archive(&self, _url: &str, item_id: &str) -> Result<ArchiveResult> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            StubBehavior::Ok(content) => {
                let data_dir = self
                    .data_dir
                    .lock()
                    .unwrap()
                    .clone()
                    .expect("StubArchiver needs a data dir before archiving");
                let safe_item = crate::utils::sanitize_identifier(item_id);
                let out_dir = data_dir.join(safe_item).join(self.name);
                tokio::fs::create_dir_all(&out_dir).await?;
                let out_path = out_dir.join(format!("output.{}", self.extension));
                tokio::fs::write(&out_path, content).await?;

                Ok(ArchiveResult {
                    success: true,
                    exit_code: Some(0),
                    saved_path: Some(out_path.display().to_string()),
                    ..Default::default()
                })
            }
            StubBehavior::Fail(exit_code) => Ok(ArchiveResult::failed(Some(*exit_code))),
            StubBehavior::Error => Err(crate::Error::Other("induced archiver error".into())),
        }
    }
}

/// Archiver whose subprocess sleeps past its timeout
///
/// Exercises the real command runner timeout path and the post-timeout
/// cleanup hook, both observable through the execution log.
pub(crate) struct TimeoutArchiver {
    runner: CommandRunner,
}

impl TimeoutArchiver {
    pub(crate) fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Archiver for TimeoutArchiver {
    fn name(&self) -> &'static str {
        "screenshot"
    }

    fn output_extension(&self) -> &'static str {
        "png"
    }

    async fn archive(&self, _url: &str, _item_id: &str) -> Result<ArchiveResult> {
        let result = self
            .runner
            .execute(
                CommandRequest::new("sleep 30", Duration::from_millis(300))
                    .with_context(None, self.name()),
            )
            .await?;

        if result.timed_out {
            self.cleanup_after_timeout().await;
            return Ok(ArchiveResult::failed(result.exit_code));
        }
        Ok(ArchiveResult::failed(result.exit_code))
    }

    async fn cleanup_after_timeout(&self) {
        // Stands in for the chromium pkill sweep; recorded the same way
        let request = CommandRequest::new("echo __CLEANUP__", Duration::from_secs(5))
            .with_context(None, self.name());
        let _ = self.runner.execute(request).await;
    }
}

/// Everything a test needs to drive the orchestrator
pub(crate) struct TestHarness {
    pub(crate) archiver: PageArchiver,
    pub(crate) data_dir: TempDir,
    pub(crate) providers: Vec<Arc<MemoryProvider>>,
    pub(crate) notifier: Arc<RecordingNotifier>,
}

/// Build a PageArchiver wired to stub archivers and in-memory storage
///
/// Mirrors the production constructor but swaps the registry and providers
/// for test doubles. `configure` runs after the defaults are applied.
pub(crate) async fn test_archiver_with(
    stubs: Vec<Arc<dyn Archiver>>,
    providers: Vec<Arc<MemoryProvider>>,
    configure: impl FnOnce(&mut Config),
) -> TestHarness {
    let data_dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.archive.data_dir = data_dir.path().to_path_buf();
    config.persistence.database_path = data_dir.path().join("test.db");
    config.cleanup.enable_local_cleanup = false;
    config.cleanup.local_workspace_retention_hours = 0;
    config.cleanup.scan_interval = Duration::from_millis(50);
    config.storage.upload_retry.max_attempts = 0;
    config.workers.workers = 2;
    configure(&mut config);
    let config = Arc::new(config);

    let db = Arc::new(Database::new(config.database_path()).await.unwrap());
    let (event_tx, _rx) = tokio::sync::broadcast::channel(1024);
    let command_runner = CommandRunner::new(db.clone(), false);
    let registry = Arc::new(ArchiverRegistry::from_archivers(stubs));

    let file_storage: Arc<Vec<Arc<dyn FileStorageProvider>>> = Arc::new(
        providers
            .iter()
            .map(|p| p.clone() as Arc<dyn FileStorageProvider>)
            .collect(),
    );
    let db_storage = Arc::new(RelationalStorage::new(db.clone()));

    let cleanup = CleanupScheduler::new(
        db.clone(),
        config.data_dir().clone(),
        config.cleanup.clone(),
        event_tx.clone(),
    );

    let pipeline = ArchivePipeline::new(
        config.clone(),
        db.clone(),
        file_storage.clone(),
        db_storage.clone(),
        cleanup.clone(),
        event_tx.clone(),
    );

    let notifier = Arc::new(RecordingNotifier::default());

    let archiver = PageArchiver {
        db,
        event_tx,
        config: config.clone(),
        command_runner,
        registry,
        pipeline,
        db_storage,
        file_storage,
        cleanup,
        summarization: Some(notifier.clone() as Arc<dyn SummarizationNotifier>),
        http_client: reqwest::Client::new(),
        queue_state: QueueState::new(config.workers.workers),
        shutdown: CancellationToken::new(),
    };

    TestHarness {
        archiver,
        data_dir,
        providers,
        notifier,
    }
}

/// Convenience: one OK stub named like a real archiver, local memory storage
pub(crate) async fn simple_harness(names: &[(&'static str, &'static str)]) -> (TestHarness, Vec<Arc<StubArchiver>>) {
    let stubs: Vec<Arc<StubArchiver>> = names
        .iter()
        .map(|&(name, ext)| Arc::new(StubArchiver::ok(name, ext)))
        .collect();
    let dyn_stubs: Vec<Arc<dyn Archiver>> = stubs
        .iter()
        .map(|s| s.clone() as Arc<dyn Archiver>)
        .collect();

    let harness = test_archiver_with(
        dyn_stubs,
        vec![Arc::new(MemoryProvider::new("local"))],
        |_| {},
    )
    .await;

    for stub in &stubs {
        stub.set_data_dir(harness.data_dir.path().to_path_buf());
    }

    (harness, stubs)
}
