//! Command execution log: execution records and captured output lines.

use crate::error::DatabaseError;
use crate::types::UrlId;
use crate::{Error, Result};

use super::{CommandExecutionRow, CommandOutputLineRow, Database};

impl Database {
    /// Create a command execution record before the subprocess is spawned
    pub async fn create_execution(
        &self,
        command: &str,
        start_time: i64,
        timeout_secs: f64,
        archived_url_id: Option<UrlId>,
        archiver: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO command_executions (
                command, start_time, timeout_secs, timed_out, archived_url_id, archiver
            ) VALUES (?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(command)
        .bind(start_time)
        .bind(timeout_secs)
        .bind(archived_url_id)
        .bind(archiver)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to create command execution: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Append a captured output line to an execution
    ///
    /// Lines are append-only; `line_number` is monotonic per stream within
    /// one execution (stdin and exception lines carry no number).
    pub async fn append_output_line(
        &self,
        execution_id: i64,
        stream: &str,
        line: &str,
        timestamp: i64,
        line_number: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO command_output_lines (execution_id, timestamp, stream, line, line_number)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(execution_id)
        .bind(timestamp)
        .bind(stream)
        .bind(line)
        .bind(line_number)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to append output line: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Finalize an execution record on subprocess exit
    pub async fn finalize_execution(
        &self,
        execution_id: i64,
        end_time: i64,
        exit_code: Option<i32>,
        timed_out: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE command_executions
            SET end_time = ?, exit_code = ?, timed_out = ?
            WHERE id = ?
            "#,
        )
        .bind(end_time)
        .bind(exit_code)
        .bind(timed_out)
        .bind(execution_id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to finalize command execution: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get one execution record
    pub async fn get_execution(&self, execution_id: i64) -> Result<Option<CommandExecutionRow>> {
        let row = sqlx::query_as::<_, CommandExecutionRow>(
            "SELECT * FROM command_executions WHERE id = ?",
        )
        .bind(execution_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get command execution: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// All captured lines of one execution, in capture order
    pub async fn get_output_lines(&self, execution_id: i64) -> Result<Vec<CommandOutputLineRow>> {
        let rows = sqlx::query_as::<_, CommandOutputLineRow>(
            "SELECT * FROM command_output_lines WHERE execution_id = ? ORDER BY id ASC",
        )
        .bind(execution_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get output lines: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Total number of recorded executions
    ///
    /// The dedup scenario tests observe this counter to prove that a skipped
    /// job never reached a subprocess.
    pub async fn count_executions(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM command_executions")
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count command executions: {}",
                    e
                )))
            })?;

        Ok(count)
    }

    /// Delete an execution record (output lines cascade)
    pub async fn delete_execution(&self, execution_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM command_executions WHERE id = ?")
            .bind(execution_id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete command execution: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }
}
