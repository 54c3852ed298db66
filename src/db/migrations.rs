//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::Database;

/// Migration v1: archived URLs and artifacts
const MIGRATION_V1: &[&str] = &[
    r#"
    CREATE TABLE archived_urls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        name TEXT,
        total_size_bytes INTEGER,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX idx_archived_urls_item_id ON archived_urls(item_id, created_at)",
    r#"
    CREATE TABLE archive_artifacts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        archived_url_id INTEGER NOT NULL
            REFERENCES archived_urls(id) ON DELETE CASCADE,
        archiver TEXT NOT NULL,
        success INTEGER NOT NULL DEFAULT 0,
        exit_code INTEGER,
        saved_path TEXT,
        size_bytes INTEGER,
        status TEXT NOT NULL DEFAULT 'pending',
        task_id TEXT,
        uploaded_to_storage INTEGER NOT NULL DEFAULT 0,
        storage_uploads TEXT,
        all_uploads_succeeded INTEGER NOT NULL DEFAULT 0,
        local_file_deleted INTEGER NOT NULL DEFAULT 0,
        local_file_deleted_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER,
        UNIQUE(archived_url_id, archiver)
    )
    "#,
    "CREATE INDEX idx_artifacts_task_id ON archive_artifacts(task_id)",
    r#"
    CREATE INDEX idx_artifact_cleanup
    ON archive_artifacts(success, all_uploads_succeeded, local_file_deleted)
    "#,
];

/// Migration v2: readability page metadata
const MIGRATION_V2: &[&str] = &[r#"
    CREATE TABLE url_metadata (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        archived_url_id INTEGER NOT NULL UNIQUE
            REFERENCES archived_urls(id) ON DELETE CASCADE,
        title TEXT,
        byline TEXT,
        excerpt TEXT,
        site_name TEXT,
        lang TEXT,
        text_content TEXT,
        word_count INTEGER,
        reading_time_minutes INTEGER,
        created_at INTEGER NOT NULL
    )
    "#];

/// Migration v3: command execution logging
const MIGRATION_V3: &[&str] = &[
    r#"
    CREATE TABLE command_executions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        command TEXT NOT NULL,
        start_time INTEGER NOT NULL,
        end_time INTEGER,
        exit_code INTEGER,
        timeout_secs REAL NOT NULL,
        timed_out INTEGER NOT NULL DEFAULT 0,
        archived_url_id INTEGER
            REFERENCES archived_urls(id) ON DELETE SET NULL,
        archiver TEXT
    )
    "#,
    "CREATE INDEX idx_command_executions_start_time ON command_executions(start_time)",
    r#"
    CREATE TABLE command_output_lines (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        execution_id INTEGER NOT NULL
            REFERENCES command_executions(id) ON DELETE CASCADE,
        timestamp INTEGER NOT NULL,
        stream TEXT NOT NULL,
        line TEXT NOT NULL,
        line_number INTEGER
    )
    "#,
    "CREATE INDEX idx_command_output_execution ON command_output_lines(execution_id)",
];

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        // Connect to database with foreign key enforcement and WAL mode
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };

        // Run migrations
        db.run_migrations().await?;

        Ok(db)
    }

    /// Access the underlying connection pool (crate-internal)
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool, flushing WAL state
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        // Create schema version table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        // Check current version
        let current_version: Option<Option<i64>> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?;

        let current_version = current_version.flatten().unwrap_or(0);

        // Apply migrations
        if current_version < 1 {
            Self::apply_migration(&mut conn, 1, MIGRATION_V1).await?;
        }
        if current_version < 2 {
            Self::apply_migration(&mut conn, 2, MIGRATION_V2).await?;
        }
        if current_version < 3 {
            Self::apply_migration(&mut conn, 3, MIGRATION_V3).await?;
        }

        Ok(())
    }

    /// Apply one migration's statements inside a transaction
    ///
    /// Partial failures roll back so a crashed migration never leaves the
    /// schema half-applied.
    async fn apply_migration(
        conn: &mut SqliteConnection,
        version: i64,
        statements: &[&str],
    ) -> Result<()> {
        tracing::info!(version, "Applying database migration");

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            for statement in statements {
                sqlx::query(statement)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Migration v{} statement failed: {}",
                            version, e
                        )))
                    })?;
            }
            Self::record_migration(&mut *conn, version).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v{}: {}",
                            version, e
                        )))
                    })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!(version, "Database migration complete");
        Ok(())
    }

    /// Record a completed migration version
    async fn record_migration(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration v{}: {}",
                    version, e
                )))
            })?;
        Ok(())
    }
}
