//! Configuration types for pagevault

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Archival behavior configuration (data directory, enabled archivers)
///
/// Groups settings related to where artifacts land on local disk and which
/// archiver strategies run. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ArchiveConfig {
    /// Root of local artifacts (default: "./data")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Ordered list of enabled archiver names (default: all five)
    ///
    /// Registration order matters: `archiver="all"` submissions run each item
    /// through the archivers in this order.
    #[serde(default = "default_archivers")]
    pub archivers: Vec<String>,

    /// Minimum artifact size in bytes for a run to count as successful (default: 1)
    #[serde(default = "default_min_output_bytes")]
    pub min_output_bytes: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            archivers: default_archivers(),
            min_output_bytes: default_min_output_bytes(),
        }
    }
}

/// Browser and external tool configuration
///
/// Paths to the binaries the archivers shell out to, plus the shared chromium
/// user-data directory. Binaries left unset are searched on PATH when
/// `search_path` is enabled.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BrowserConfig {
    /// Path to the chromium executable (auto-detected if None)
    #[serde(default)]
    pub chromium_bin: Option<PathBuf>,

    /// Path to the monolith executable (auto-detected if None)
    #[serde(default)]
    pub monolith_bin: Option<PathBuf>,

    /// Path to the single-file CLI executable (auto-detected if None)
    #[serde(default)]
    pub singlefile_bin: Option<PathBuf>,

    /// Path to the readability extraction CLI (auto-detected if None)
    #[serde(default)]
    pub readability_bin: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Chromium user-data directory (default: "<data_dir>/chromium-profile")
    ///
    /// Shared-mutable across browser-backed archivers; safe only because
    /// subprocess execution is globally serialized.
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,

    /// Chromium profile directory name within the user-data dir
    #[serde(default)]
    pub profile_directory: Option<String>,

    /// Virtual time budget granted to the renderer, in milliseconds (default: 9000)
    #[serde(default = "default_virtual_time_budget_ms")]
    pub virtual_time_budget_ms: u64,

    /// Screenshot viewport width in pixels (default: 1920)
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    /// Screenshot viewport height in pixels (default: 8000)
    ///
    /// Tall enough for near-full-page captures; the CLI screenshot path does
    /// not do a true full-page capture.
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Per-archiver subprocess timeout (default: 120 seconds)
    #[serde(default = "default_archive_timeout", with = "duration_serde")]
    pub archive_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chromium_bin: None,
            monolith_bin: None,
            singlefile_bin: None,
            readability_bin: None,
            search_path: true,
            user_data_dir: None,
            profile_directory: None,
            virtual_time_budget_ms: default_virtual_time_budget_ms(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            archive_timeout: default_archive_timeout(),
        }
    }
}

impl BrowserConfig {
    /// Resolve the chromium user-data directory, defaulting under `data_dir`
    pub fn resolved_user_data_dir(&self, data_dir: &std::path::Path) -> PathBuf {
        self.user_data_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("chromium-profile"))
    }
}

/// File storage provider selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageProviderKind {
    /// Directory tree on local disk
    Local,
    /// Google Cloud Storage bucket
    Gcs,
}

/// GCS provider configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct GcsConfig {
    /// Bucket name (required when the gcs provider is enabled)
    #[serde(default)]
    pub bucket: Option<String>,

    /// Optional key prefix prepended to every object path
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Storage fan-out configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Ordered list of enabled file storage providers (default: [local])
    #[serde(default = "default_storage_providers")]
    pub providers: Vec<StorageProviderKind>,

    /// Root directory of the local provider (default: "<data_dir>/storage")
    #[serde(default)]
    pub local_root: Option<PathBuf>,

    /// GCS settings
    #[serde(default)]
    pub gcs: GcsConfig,

    /// Gzip artifacts before storing them (default: true)
    #[serde(default = "default_true")]
    pub compress_uploads: bool,

    /// Retry configuration for transient upload failures
    #[serde(default)]
    pub upload_retry: RetryConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            providers: default_storage_providers(),
            local_root: None,
            gcs: GcsConfig::default(),
            compress_uploads: true,
            upload_retry: RetryConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Resolve the local provider root, defaulting under `data_dir`
    pub fn resolved_local_root(&self, data_dir: &std::path::Path) -> PathBuf {
        self.local_root
            .clone()
            .unwrap_or_else(|| data_dir.join("storage"))
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Failure mode for dual-persistence replica writes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DualWriteFailureMode {
    /// A replica failure propagates to the caller
    Strict,
    /// A replica failure is logged and swallowed (default)
    #[default]
    BestEffort,
}

/// Data storage and state management configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Catalog database path (default: "./pagevault.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Mirror catalog writes into the document store (default: false)
    #[serde(default)]
    pub enable_dual_persistence: bool,

    /// How replica write failures are handled in dual mode
    #[serde(default)]
    pub dual_write_failure_mode: DualWriteFailureMode,

    /// Directory of the denormalized document store (default: "<data_dir>/documents")
    #[serde(default)]
    pub document_store_dir: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            enable_dual_persistence: false,
            dual_write_failure_mode: DualWriteFailureMode::default(),
            document_store_dir: None,
        }
    }
}

impl PersistenceConfig {
    /// Resolve the document store directory, defaulting under `data_dir`
    pub fn resolved_document_store_dir(&self, data_dir: &std::path::Path) -> PathBuf {
        self.document_store_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("documents"))
    }
}

/// Paywall wrapper rewriting configuration
///
/// Certain hosts are archived through a wrapper service that carries the real
/// URL as a path suffix; dedup lookups try both forms.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PaywallConfig {
    /// Enable wrapper rewriting (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the wrapper service
    #[serde(default = "default_paywall_wrapper_base")]
    pub wrapper_base: String,

    /// Host suffixes routed through the wrapper
    #[serde(default = "default_paywall_hosts")]
    pub hosts: Vec<String>,
}

impl Default for PaywallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wrapper_base: default_paywall_wrapper_base(),
            hosts: default_paywall_hosts(),
        }
    }
}

/// Deduplication and pre-flight configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DedupConfig {
    /// Reuse existing successful artifacts instead of re-archiving (default: true)
    #[serde(default = "default_true")]
    pub skip_existing_saves: bool,

    /// Whether resubmissions re-probe URLs already recorded as 404 (default: false)
    ///
    /// Off, a 404 pre-flight is terminal for its `(item, url, archiver)`
    /// triple: both submission paths reuse the recorded failure without
    /// probing or archiving again. The admin requeue resets the row and
    /// always probes afresh. On, every submission probes.
    #[serde(default)]
    pub retry_unreachable: bool,

    /// Paywall wrapper rewriting
    #[serde(default)]
    pub paywall: PaywallConfig,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            skip_existing_saves: true,
            retry_unreachable: false,
            paywall: PaywallConfig::default(),
        }
    }
}

/// Deferred local cleanup configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CleanupConfig {
    /// Delete local artifacts after all uploads succeed (default: false)
    #[serde(default)]
    pub enable_local_cleanup: bool,

    /// Retention window before a promoted artifact's local file is removed (default: 24)
    #[serde(default = "default_retention_hours")]
    pub local_workspace_retention_hours: u64,

    /// Interval between cleanup scans (default: 60 seconds)
    #[serde(default = "default_cleanup_scan_interval", with = "duration_serde")]
    pub scan_interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enable_local_cleanup: false,
            local_workspace_retention_hours: default_retention_hours(),
            scan_interval: default_cleanup_scan_interval(),
        }
    }
}

/// Worker pool configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkerConfig {
    /// Number of concurrently processed batch tasks (default: 2)
    ///
    /// Subprocess execution is globally serialized, so extra workers mostly
    /// overlap storage I/O and catalog writes, not archiver runs.
    #[serde(default = "default_worker_count")]
    pub workers: usize,

    /// Maximum queued batch tasks before submissions are rejected (default: 256)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Summarization notifier configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SummarizationConfig {
    /// Webhook URL notified of completed readability artifacts (None = disabled)
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Webhook request timeout (default: 10 seconds)
    #[serde(default = "default_summarization_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout: default_summarization_timeout(),
        }
    }
}

/// Role this process plays in a deployment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceRole {
    /// Full service: API, workers, summarization notifications (default)
    #[default]
    Full,
    /// Worker-only role: skips summarization bootstrap
    ArchiverWorker,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:7070)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Optional API key for authentication
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Main configuration for PageArchiver
///
/// Fields are organized into logical sub-configs:
/// - [`archive`](ArchiveConfig) — data directory, enabled archivers
/// - [`browser`](BrowserConfig) — external binary paths, chromium profile
/// - [`storage`](StorageConfig) — storage fan-out providers
/// - [`persistence`](PersistenceConfig) — catalog and document store
/// - [`dedup`](DedupConfig) — skip logic, paywall wrapper, 404 policy
/// - [`cleanup`](CleanupConfig) — deferred local cleanup
/// - [`workers`](WorkerConfig) — task queue and worker pool
/// - [`summarization`](SummarizationConfig) — downstream notification
/// - [`server`](ServerIntegrationConfig) — REST API
///
/// Sub-config fields are flattened for serialization so the JSON/TOML format
/// stays flat where the field names are unambiguous.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Archival behavior settings
    #[serde(flatten)]
    pub archive: ArchiveConfig,

    /// Browser and external tool settings
    #[serde(flatten)]
    pub browser: BrowserConfig,

    /// Storage fan-out settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Catalog and document store settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Deduplication and pre-flight settings
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Deferred local cleanup settings
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Task queue and worker pool settings
    #[serde(default)]
    pub workers: WorkerConfig,

    /// Summarization notifier settings
    #[serde(default)]
    pub summarization: SummarizationConfig,

    /// Process role
    #[serde(default)]
    pub service_role: ServiceRole,

    /// API and external server integration
    #[serde(flatten)]
    pub server: ServerIntegrationConfig,
}

// Convenience accessors - allow call sites to use `config.data_dir()` etc.
impl Config {
    /// Root of local artifacts
    pub fn data_dir(&self) -> &PathBuf {
        &self.archive.data_dir
    }

    /// Catalog database path
    pub fn database_path(&self) -> &PathBuf {
        &self.persistence.database_path
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_archivers() -> Vec<String> {
    vec![
        "monolith".into(),
        "readability".into(),
        "singlefile".into(),
        "screenshot".into(),
        "pdf".into(),
    ]
}

fn default_min_output_bytes() -> u64 {
    1
}

fn default_database_path() -> PathBuf {
    PathBuf::from("pagevault.db")
}

fn default_true() -> bool {
    true
}

fn default_virtual_time_budget_ms() -> u64 {
    9000
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    8000
}

fn default_archive_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_storage_providers() -> Vec<StorageProviderKind> {
    vec![StorageProviderKind::Local]
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_paywall_wrapper_base() -> String {
    "https://freedium.cfd".to_string()
}

fn default_paywall_hosts() -> Vec<String> {
    vec!["medium.com".into(), "towardsdatascience.com".into()]
}

fn default_retention_hours() -> u64 {
    24
}

fn default_cleanup_scan_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_worker_count() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    256
}

fn default_summarization_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7070))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
