//! Core types and events for pagevault

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Newtype wrapper for archived URL catalog IDs
///
/// Provides type safety to prevent mixing up archived URL IDs with artifact
/// IDs or other integer values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct UrlId(pub i64);

/// Newtype wrapper for archive artifact catalog IDs
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct ArtifactId(pub i64);

impl std::fmt::Display for UrlId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implement sqlx traits so the newtypes can be bound directly in queries
impl sqlx::Type<sqlx::Sqlite> for UrlId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for UrlId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> std::result::Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<'q, sqlx::Sqlite>>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for UrlId {
    fn decode(
        value: sqlx::sqlite::SqliteValueRef<'r>,
    ) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        Ok(UrlId(<i64 as sqlx::Decode<'r, sqlx::Sqlite>>::decode(
            value,
        )?))
    }
}

impl sqlx::Type<sqlx::Sqlite> for ArtifactId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ArtifactId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> std::result::Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<'q, sqlx::Sqlite>>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ArtifactId {
    fn decode(
        value: sqlx::sqlite::SqliteValueRef<'r>,
    ) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        Ok(ArtifactId(<i64 as sqlx::Decode<'r, sqlx::Sqlite>>::decode(
            value,
        )?))
    }
}

/// Lifecycle status of an archive artifact
///
/// An artifact is created `Pending` at submission time and reaches a terminal
/// state (`Success` or `Failed`) when its job completes. Storage promotion and
/// local cleanup are tracked by separate flags and never change this status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStatus {
    /// Job accepted, archiver not yet run (or requeued)
    #[default]
    Pending,
    /// Archiver produced a valid artifact
    Success,
    /// Archiver failed (non-zero exit, timeout, size check, 404 pre-flight)
    Failed,
}

impl ArchiveStatus {
    /// Stable string form used in the catalog `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveStatus::Pending => "pending",
            ArchiveStatus::Success => "success",
            ArchiveStatus::Failed => "failed",
        }
    }

    /// Parse the catalog string form; unknown values are treated as pending
    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "success" => ArchiveStatus::Success,
            "failed" => ArchiveStatus::Failed,
            _ => ArchiveStatus::Pending,
        }
    }

    /// Whether this status is terminal (success or failed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ArchiveStatus::Pending)
    }
}

/// Result of one archiver run for one URL
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ArchiveResult {
    /// Whether the archiver produced a valid artifact
    pub success: bool,
    /// Exit code of the underlying subprocess (None on timeout or spawn failure)
    pub exit_code: Option<i32>,
    /// Path of the produced artifact on local disk (None on failure)
    pub saved_path: Option<String>,
    /// Structured metadata extracted by the archiver (readability only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PageMetadata>,
    /// Per-provider upload outcomes, populated by the storage fan-out
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub storage_uploads: Vec<StorageUploadRecord>,
    /// Logical AND of upload success across all configured providers
    #[serde(default)]
    pub all_uploads_succeeded: bool,
}

impl ArchiveResult {
    /// A failed result carrying only an exit code
    pub fn failed(exit_code: Option<i32>) -> Self {
        Self {
            success: false,
            exit_code,
            ..Default::default()
        }
    }
}

/// Structured page metadata extracted by the readability archiver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PageMetadata {
    /// Document title
    pub title: Option<String>,
    /// Author byline
    pub byline: Option<String>,
    /// Short excerpt / description
    pub excerpt: Option<String>,
    /// Site name (og:site_name or similar)
    pub site_name: Option<String>,
    /// Document language code
    pub lang: Option<String>,
    /// Extracted plain text content
    pub text_content: Option<String>,
    /// Word count of the extracted text
    pub word_count: Option<i64>,
    /// Estimated reading time in minutes (200 wpm)
    pub reading_time_minutes: Option<i64>,
}

/// Outcome of uploading one artifact to one storage provider
///
/// These records are embedded as a JSON list on the artifact row; the list
/// length always equals the number of providers configured at upload time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StorageUploadRecord {
    /// Provider name ("local", "gcs")
    pub provider_name: String,
    /// Whether the upload succeeded
    pub success: bool,
    /// Provider URI of the stored object (e.g. "gs://bucket/archives/...")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_uri: Option<String>,
    /// Size of the local file before compression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    /// Size as stored (post-compression)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_size: Option<u64>,
    /// stored_size / original_size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    /// Unix timestamp of the upload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<i64>,
    /// Error message when the upload failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One unit of work inside a batch task: a single (item, archiver) pair
///
/// The pending artifact row referenced by `rowid` is the durable side of this
/// value; the in-memory struct itself does not survive a restart.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Sanitized item identifier
    pub item_id: String,
    /// URL to archive
    pub url: String,
    /// Back-reference to the pending artifact row
    pub rowid: ArtifactId,
    /// Archiver to run for this item
    pub archiver_name: String,
}

/// An in-memory batch of archive jobs processed sequentially by one worker
#[derive(Debug, Clone)]
pub struct BatchTask {
    /// Opaque task identifier (UUID)
    pub task_id: String,
    /// Archiver name as submitted ("all" expands per item)
    pub archiver_name: String,
    /// Items in processing order
    pub items: Vec<BatchItem>,
}

/// Events emitted by the archival pipeline
///
/// Subscribe via [`crate::PageArchiver::subscribe`]. Events are broadcast to
/// all subscribers; slow subscribers may observe `Lagged` errors.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch task was accepted and enqueued
    TaskQueued {
        /// Task identifier
        task_id: String,
        /// Number of (item, archiver) jobs in the task
        count: usize,
    },
    /// An archiver run started for one item
    ArchiveStarted {
        /// Item identifier
        item_id: String,
        /// Archiver name
        archiver: String,
    },
    /// An archiver run finished (either outcome)
    ArchiveCompleted {
        /// Item identifier
        item_id: String,
        /// Archiver name
        archiver: String,
        /// Whether the run succeeded
        success: bool,
        /// Subprocess exit code if one was observed
        exit_code: Option<i32>,
    },
    /// Upload fan-out for one artifact finished
    UploadsCompleted {
        /// Item identifier
        item_id: String,
        /// Archiver name
        archiver: String,
        /// Whether every provider accepted the upload
        all_succeeded: bool,
    },
    /// A local artifact file was removed by the cleanup scheduler
    LocalFileCleaned {
        /// Artifact row whose file was removed
        artifact_id: ArtifactId,
        /// Path that was removed
        path: String,
    },
    /// All items of a batch task reached a terminal state
    TaskCompleted {
        /// Task identifier
        task_id: String,
    },
}

// ---------------------------------------------------------------------------
// API request/response bodies
// ---------------------------------------------------------------------------

/// Request body for single-URL archive endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveRequest {
    /// Client-supplied item identifier (sanitized before filesystem use)
    pub id: String,
    /// URL to archive
    pub url: String,
    /// Optional display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Response body for the synchronous archive endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveResponse {
    /// Whether the (last) archiver run succeeded
    pub ok: bool,
    /// Exit code of the (last) archiver run
    pub exit_code: Option<i32>,
    /// Saved artifact path of the (last) archiver run
    pub saved_path: Option<String>,
    /// Sanitized item identifier
    pub id: String,
    /// Catalog row id of the (last) recorded artifact
    pub db_rowid: Option<i64>,
}

/// One item of a batch submission
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchSaveItem {
    /// Client-supplied item identifier
    pub id: String,
    /// URL to archive
    pub url: String,
    /// Optional display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Request body for batch archive endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchCreateRequest {
    /// Items to archive
    pub items: Vec<BatchSaveItem>,
}

/// 202 response for asynchronous submissions
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskAccepted {
    /// Opaque task identifier for status polling
    pub task_id: String,
    /// Number of submitted items
    pub count: usize,
}

/// Per-item status within a task
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskItemStatus {
    /// URL being archived
    pub url: String,
    /// Sanitized item identifier
    pub id: String,
    /// Optional display name
    pub name: Option<String>,
    /// pending | success | failed
    pub status: ArchiveStatus,
    /// Archiver for this row
    pub archiver: Option<String>,
    /// Exit code once terminal
    pub exit_code: Option<i32>,
    /// Artifact path once successful
    pub saved_path: Option<String>,
    /// Catalog row id
    pub db_rowid: i64,
}

/// Aggregate task status response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskStatusResponse {
    /// Task identifier
    pub task_id: String,
    /// pending if any item pending, else failed if any failed, else success
    pub status: ArchiveStatus,
    /// Per-item detail
    pub items: Vec<TaskItemStatus>,
}

/// Request body for artifact retrieval
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ArchiveRetrieveRequest {
    /// Item identifier to look up
    #[serde(default)]
    pub id: Option<String>,
    /// URL to look up (used when id is absent)
    #[serde(default)]
    pub url: Option<String>,
    /// Specific archiver name, or "all" for a tarball bundle (default)
    #[serde(default)]
    pub archiver: Option<String>,
}

/// Per-artifact size entry in the size stats response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArtifactSize {
    /// Archiver name
    pub archiver: String,
    /// Artifact size in bytes
    pub size_bytes: Option<i64>,
    /// Artifact path
    pub saved_path: Option<String>,
}

/// Size statistics for one archived URL
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SizeStatsResponse {
    /// Sum of sizes across successful artifacts
    pub total_size_bytes: i64,
    /// Per-artifact breakdown
    pub artifacts: Vec<ArtifactSize>,
}

/// One row of the admin saves listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminSaveRow {
    /// Artifact catalog row id
    pub rowid: i64,
    /// Item identifier
    pub id: String,
    /// Archived URL
    pub url: String,
    /// Optional display name
    pub name: Option<String>,
    /// Artifact status
    pub status: ArchiveStatus,
    /// Success flag (0/1 for client compatibility)
    pub success: i64,
    /// Exit code
    pub exit_code: Option<i32>,
    /// Artifact path
    pub saved_path: Option<String>,
    /// Whether the artifact file currently exists on disk
    pub file_exists: bool,
    /// Path relative to the data dir, when the artifact lives under it
    pub relative_path: Option<String>,
    /// Archiver name (recorded, or inferred from the path)
    pub archiver: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: Option<String>,
}

/// Response for admin delete endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    /// Number of catalog rows deleted
    pub deleted_count: u64,
    /// Row ids that were deleted
    pub deleted_rowids: Vec<i64>,
    /// Files removed from disk (when remove_files was requested)
    pub removed_files: Vec<String>,
    /// Non-fatal errors encountered while removing files
    pub errors: Vec<String>,
    /// Always true when the request itself succeeded
    pub ok: bool,
}

/// Request body for the admin re-summarize endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SummarizeRequest {
    /// Artifact row id to summarize
    #[serde(default)]
    pub rowid: Option<i64>,
    /// Item identifier to summarize (first artifact wins)
    #[serde(default)]
    pub item_id: Option<String>,
    /// URL to summarize (first artifact wins)
    #[serde(default)]
    pub url: Option<String>,
}

/// Response body for the admin re-summarize endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SummarizeResponse {
    /// Whether the notification was scheduled
    pub ok: bool,
    /// Archived URL the notification refers to
    pub archived_url_id: i64,
    /// Whether the notifier accepted the request
    pub summary_created: bool,
}
