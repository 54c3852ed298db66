//! Database layer for pagevault
//!
//! Handles SQLite persistence for the archival catalog: archived URLs,
//! per-archiver artifacts, extracted page metadata, and full subprocess logs.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`urls`] — Archived URL CRUD
//! - [`artifacts`] — Artifact rows, status transitions, upload records
//! - [`metadata`] — Readability page metadata
//! - [`executions`] — Command execution log and output lines
//! - [`dedup`] — Dedup/skip queries
//! - [`tasks`] — Task status rows

use crate::types::{ArchiveStatus, StorageUploadRecord, UrlId};
use sqlx::{FromRow, sqlite::SqlitePool};

mod artifacts;
mod dedup;
mod executions;
mod metadata;
mod migrations;
mod tasks;
mod urls;

/// Archived URL record from the catalog
#[derive(Debug, Clone, FromRow)]
pub struct ArchivedUrl {
    /// Unique database ID
    pub id: i64,
    /// Sanitized item identifier supplied at submission
    pub item_id: String,
    /// The archived URL (unique)
    pub url: String,
    /// Optional display name
    pub name: Option<String>,
    /// Sum of sizes over this URL's successful artifacts
    pub total_size_bytes: Option<i64>,
    /// Unix timestamp when the URL was first recorded
    pub created_at: i64,
}

/// Archive artifact record from the catalog
///
/// One row per `(archived_url_id, archiver)`; retries and requeues update the
/// existing row rather than inserting a new one.
#[derive(Debug, Clone, FromRow)]
pub struct ArchiveArtifact {
    /// Unique database ID
    pub id: i64,
    /// Owning archived URL
    pub archived_url_id: i64,
    /// Archiver name (catalog key and directory name)
    pub archiver: String,
    /// Whether the archiver produced a valid artifact
    pub success: bool,
    /// Subprocess exit code (None on timeout / spawn failure / pending)
    pub exit_code: Option<i32>,
    /// Artifact path on local disk
    pub saved_path: Option<String>,
    /// Artifact size in bytes
    pub size_bytes: Option<i64>,
    /// pending | success | failed
    pub status: String,
    /// Task that most recently owned this row
    pub task_id: Option<String>,
    /// Whether the artifact was uploaded to all configured providers
    pub uploaded_to_storage: bool,
    /// JSON list of per-provider upload results
    pub storage_uploads: Option<String>,
    /// Logical AND of upload success across providers
    pub all_uploads_succeeded: bool,
    /// Whether the local file was removed by the cleanup scheduler
    pub local_file_deleted: bool,
    /// Unix timestamp of the local file removal
    pub local_file_deleted_at: Option<i64>,
    /// Unix timestamp when the row was created
    pub created_at: i64,
    /// Unix timestamp of the last update
    pub updated_at: Option<i64>,
}

impl ArchiveArtifact {
    /// Parsed lifecycle status
    pub fn archive_status(&self) -> ArchiveStatus {
        ArchiveStatus::from_str_lossy(&self.status)
    }

    /// Decode the embedded per-provider upload records
    pub fn upload_records(&self) -> Vec<StorageUploadRecord> {
        self.storage_uploads
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default()
    }
}

/// Joined artifact + archived URL row used by listings and task status
#[derive(Debug, Clone, FromRow)]
pub struct SaveRow {
    /// Artifact row id
    pub id: i64,
    /// Owning archived URL id
    pub archived_url_id: i64,
    /// Archiver name
    pub archiver: String,
    /// Success flag
    pub success: bool,
    /// Exit code
    pub exit_code: Option<i32>,
    /// Artifact path
    pub saved_path: Option<String>,
    /// Artifact size
    pub size_bytes: Option<i64>,
    /// pending | success | failed
    pub status: String,
    /// Owning task id
    pub task_id: Option<String>,
    /// Row creation timestamp
    pub created_at: i64,
    /// Item identifier from the archived URL
    pub item_id: String,
    /// The archived URL
    pub url: String,
    /// Display name from the archived URL
    pub name: Option<String>,
}

impl SaveRow {
    /// Parsed lifecycle status
    pub fn archive_status(&self) -> ArchiveStatus {
        ArchiveStatus::from_str_lossy(&self.status)
    }
}

/// Page metadata record from the catalog (one per archived URL)
#[derive(Debug, Clone, FromRow)]
pub struct UrlMetadataRow {
    /// Unique database ID
    pub id: i64,
    /// Owning archived URL
    pub archived_url_id: i64,
    /// Document title
    pub title: Option<String>,
    /// Author byline
    pub byline: Option<String>,
    /// Short excerpt / description
    pub excerpt: Option<String>,
    /// Site name
    pub site_name: Option<String>,
    /// Document language code
    pub lang: Option<String>,
    /// Extracted plain text
    pub text_content: Option<String>,
    /// Word count of the extracted text
    pub word_count: Option<i64>,
    /// Estimated reading time in minutes
    pub reading_time_minutes: Option<i64>,
    /// Unix timestamp when the metadata was recorded
    pub created_at: i64,
}

/// Command execution record from the catalog
#[derive(Debug, Clone, FromRow)]
pub struct CommandExecutionRow {
    /// Unique database ID
    pub id: i64,
    /// The shell command that was executed
    pub command: String,
    /// Unix timestamp when execution started
    pub start_time: i64,
    /// Unix timestamp when execution finished
    pub end_time: Option<i64>,
    /// Subprocess exit code (None on timeout / spawn failure)
    pub exit_code: Option<i32>,
    /// Configured timeout in seconds
    pub timeout_secs: f64,
    /// Whether the execution hit its timeout
    pub timed_out: bool,
    /// Optional archiving context: archived URL
    pub archived_url_id: Option<i64>,
    /// Optional archiving context: archiver name
    pub archiver: Option<String>,
}

/// Captured output line of a command execution
#[derive(Debug, Clone, FromRow)]
pub struct CommandOutputLineRow {
    /// Unique database ID
    pub id: i64,
    /// Owning execution
    pub execution_id: i64,
    /// Unix timestamp the line was observed
    pub timestamp: i64,
    /// stdin | stdout | stderr
    pub stream: String,
    /// Line content (without trailing newline)
    pub line: String,
    /// Monotonic per-stream line number (None for stdin / exception lines)
    pub line_number: Option<i64>,
}

/// Parameters for recording a terminal artifact result in one call
///
/// Used by the synchronous archive path, which has no pre-inserted pending
/// row to finalize.
#[derive(Debug, Clone)]
pub struct ArtifactResultParams<'a> {
    /// Owning archived URL
    pub archived_url_id: UrlId,
    /// Archiver name
    pub archiver: &'a str,
    /// Whether the run succeeded
    pub success: bool,
    /// Subprocess exit code
    pub exit_code: Option<i32>,
    /// Artifact path on success
    pub saved_path: Option<&'a str>,
    /// Artifact size in bytes
    pub size_bytes: Option<i64>,
    /// Task id when recorded on behalf of a batch
    pub task_id: Option<&'a str>,
}

/// Database handle for pagevault
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
