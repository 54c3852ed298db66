//! Serialized subprocess execution with full observability and replay
//!
//! Every command runs through `sh -c` under a process-wide lock, with each
//! output line captured into the catalog alongside timestamps and monotonic
//! per-stream line numbers. Past executions can be replayed from the catalog
//! without re-running anything.
//!
//! The global lock is deliberate: headless browser instances sharing a
//! user-data directory interfere with each other, so archiver subprocesses
//! are never concurrent. Callers that want parallelism use the worker pool,
//! which overlaps storage I/O and catalog writes instead.

use crate::db::Database;
use crate::types::UrlId;
use crate::{Error, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

/// Grace period between SIGTERM and SIGKILL on timeout
const KILL_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// A command to execute, with its timeout and optional archiving context
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Shell command (run through `sh -c`)
    pub command: String,
    /// Wall-clock timeout for the whole execution
    pub timeout: Duration,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Archiving context: owning archived URL
    pub archived_url_id: Option<UrlId>,
    /// Archiving context: archiver name
    pub archiver: Option<String>,
}

impl CommandRequest {
    /// A request with just a command and timeout
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
            cwd: None,
            env: Vec::new(),
            archived_url_id: None,
            archiver: None,
        }
    }

    /// Attach archiving context recorded on the execution row
    pub fn with_context(mut self, archived_url_id: Option<UrlId>, archiver: &str) -> Self {
        self.archived_url_id = archived_url_id;
        self.archiver = Some(archiver.to_string());
        self
    }
}

/// Result of a command execution with full context
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Catalog id of the execution record
    pub execution_id: i64,
    /// The command that ran
    pub command: String,
    /// Exit code (None on timeout or spawn failure)
    pub exit_code: Option<i32>,
    /// Whether the execution hit its timeout
    pub timed_out: bool,
    /// Wall-clock duration in seconds
    pub duration_seconds: f64,
    /// Captured stdout lines in order
    pub stdout_lines: Vec<String>,
    /// Captured stderr lines in order
    pub stderr_lines: Vec<String>,
    /// Interleaved `[stream] line` view of both streams
    pub combined_output: Vec<String>,
    /// Number of catalog writes that failed while capturing lines
    ///
    /// Capture failures never abort the subprocess; a non-zero value flags
    /// an incomplete log.
    pub log_errors: u32,
}

impl CommandResult {
    /// Command succeeded if it completed with exit code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// Accumulates captured lines while the subprocess streams output
#[derive(Default)]
struct CaptureState {
    stdout_lines: Vec<String>,
    stderr_lines: Vec<String>,
    combined_output: Vec<String>,
    log_errors: u32,
}

/// Serialized command runner that logs all execution details to the catalog
///
/// Cloneable; all clones share the same execution lock.
#[derive(Clone)]
pub struct CommandRunner {
    db: Arc<Database>,
    lock: Arc<Mutex<()>>,
    debug: bool,
}

impl CommandRunner {
    /// Create a new CommandRunner
    ///
    /// With `debug` set, every captured line is echoed at DEBUG level.
    pub fn new(db: Arc<Database>, debug: bool) -> Self {
        Self {
            db,
            lock: Arc::new(Mutex::new(())),
            debug,
        }
    }

    /// Execute a shell command with full observability
    ///
    /// Holds the process-wide execution lock for the whole call. On timeout
    /// the process receives SIGTERM, then SIGKILL after a grace period, and
    /// the result carries `timed_out = true` with no exit code. A spawn
    /// failure is recorded as a stderr line and produces a non-success
    /// result rather than an error.
    pub async fn execute(&self, request: CommandRequest) -> Result<CommandResult> {
        let _guard = self.lock.lock().await;
        self.execute_locked(request).await
    }

    async fn execute_locked(&self, request: CommandRequest) -> Result<CommandResult> {
        let start = std::time::Instant::now();
        let start_time = chrono::Utc::now().timestamp();

        let execution_id = self
            .db
            .create_execution(
                &request.command,
                start_time,
                request.timeout.as_secs_f64(),
                request.archived_url_id,
                request.archiver.as_deref(),
            )
            .await?;

        tracing::info!(
            execution_id,
            command = %request.command,
            timeout_secs = request.timeout.as_secs_f64(),
            archiver = request.archiver.as_deref(),
            "Executing command"
        );

        let mut state = CaptureState::default();

        // The command itself is logged as the stdin line of the execution
        self.append_line(&mut state, execution_id, "stdin", &request.command, None)
            .await;
        if self.debug {
            tracing::debug!("[stdin] {}", request.command);
        }

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(&request.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        let mut exit_code: Option<i32> = None;
        let mut timed_out = false;

        match cmd.spawn() {
            Ok(mut child) => {
                let stdout = child.stdout.take();
                let stderr = child.stderr.take();

                let outcome = tokio::time::timeout(request.timeout, async {
                    self.capture_streams(&mut state, execution_id, stdout, stderr)
                        .await;
                    child.wait().await
                })
                .await;

                match outcome {
                    Ok(Ok(status)) => {
                        exit_code = status.code();
                    }
                    Ok(Err(e)) => {
                        let msg = format!("Exception: wait failed: {e}");
                        state.stderr_lines.push(msg.clone());
                        state.combined_output.push(format!("[stderr] {msg}"));
                        self.append_line(&mut state, execution_id, "stderr", &msg, None)
                            .await;
                    }
                    Err(_) => {
                        timed_out = true;
                        tracing::warn!(
                            execution_id,
                            command = %request.command,
                            timeout_secs = request.timeout.as_secs_f64(),
                            "Command timed out"
                        );
                        terminate_child(&mut child).await;
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    execution_id,
                    command = %request.command,
                    error = %e,
                    "Command execution failed with exception"
                );
                let msg = format!("Exception: {e}");
                state.stderr_lines.push(msg.clone());
                state.combined_output.push(format!("[stderr] {msg}"));
                self.append_line(&mut state, execution_id, "stderr", &msg, None)
                    .await;
            }
        }

        let end_time = chrono::Utc::now().timestamp();
        let duration = start.elapsed().as_secs_f64();

        self.db
            .finalize_execution(execution_id, end_time, exit_code, timed_out)
            .await?;

        tracing::info!(
            execution_id,
            exit_code,
            timed_out,
            duration_seconds = duration,
            log_errors = state.log_errors,
            "Command completed"
        );

        Ok(CommandResult {
            execution_id,
            command: request.command,
            exit_code,
            timed_out,
            duration_seconds: duration,
            stdout_lines: state.stdout_lines,
            stderr_lines: state.stderr_lines,
            combined_output: state.combined_output,
            log_errors: state.log_errors,
        })
    }

    /// Drain both pipes to EOF, capturing every line
    ///
    /// Streams are read in arrival order within each pipe; line numbers are
    /// monotonic per stream and independent between stdout and stderr.
    async fn capture_streams(
        &self,
        state: &mut CaptureState,
        execution_id: i64,
        stdout: Option<tokio::process::ChildStdout>,
        stderr: Option<tokio::process::ChildStderr>,
    ) {
        let mut stdout_lines = match stdout {
            Some(out) => Some(BufReader::new(out).lines()),
            None => None,
        };
        let mut stderr_lines = match stderr {
            Some(err) => Some(BufReader::new(err).lines()),
            None => None,
        };

        let mut stdout_num: i64 = 0;
        let mut stderr_num: i64 = 0;
        let mut stdout_open = stdout_lines.is_some();
        let mut stderr_open = stderr_lines.is_some();

        while stdout_open || stderr_open {
            tokio::select! {
                line = async {
                    match stdout_lines.as_mut() {
                        Some(lines) => lines.next_line().await,
                        None => Ok(None),
                    }
                }, if stdout_open => {
                    match line {
                        Ok(Some(line)) => {
                            stdout_num += 1;
                            state.stdout_lines.push(line.clone());
                            state.combined_output.push(format!("[stdout] {line}"));
                            self.append_line(state, execution_id, "stdout", &line, Some(stdout_num)).await;
                            if self.debug {
                                tracing::debug!("[stdout] {line}");
                            }
                        }
                        _ => stdout_open = false,
                    }
                }
                line = async {
                    match stderr_lines.as_mut() {
                        Some(lines) => lines.next_line().await,
                        None => Ok(None),
                    }
                }, if stderr_open => {
                    match line {
                        Ok(Some(line)) => {
                            stderr_num += 1;
                            state.stderr_lines.push(line.clone());
                            state.combined_output.push(format!("[stderr] {line}"));
                            self.append_line(state, execution_id, "stderr", &line, Some(stderr_num)).await;
                            if self.debug {
                                tracing::debug!("[stderr] {line}");
                            }
                        }
                        _ => stderr_open = false,
                    }
                }
            }
        }
    }

    /// Append a line to the catalog; failures are counted, never propagated
    async fn append_line(
        &self,
        state: &mut CaptureState,
        execution_id: i64,
        stream: &str,
        line: &str,
        line_number: Option<i64>,
    ) {
        let timestamp = chrono::Utc::now().timestamp();
        if let Err(e) = self
            .db
            .append_output_line(execution_id, stream, line, timestamp, line_number)
            .await
        {
            state.log_errors += 1;
            tracing::warn!(
                execution_id,
                stream,
                error = %e,
                "Failed to record command output line"
            );
        }
    }

    /// Replay a past command execution from catalog logs
    ///
    /// Reconstructs the full execution context without re-running the
    /// command. Useful for post-mortem analysis of an archiving run.
    pub async fn replay(&self, execution_id: i64) -> Result<CommandResult> {
        let execution = self
            .db
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("command execution {execution_id}")))?;

        let output_lines = self.db.get_output_lines(execution_id).await?;

        let stdout_lines: Vec<String> = output_lines
            .iter()
            .filter(|l| l.stream == "stdout")
            .map(|l| l.line.clone())
            .collect();
        let stderr_lines: Vec<String> = output_lines
            .iter()
            .filter(|l| l.stream == "stderr")
            .map(|l| l.line.clone())
            .collect();
        let combined_output: Vec<String> = output_lines
            .iter()
            .filter(|l| l.stream == "stdout" || l.stream == "stderr")
            .map(|l| format!("[{}] {}", l.stream, l.line))
            .collect();

        let duration = match execution.end_time {
            Some(end) => (end - execution.start_time) as f64,
            None => 0.0,
        };

        Ok(CommandResult {
            execution_id: execution.id,
            command: execution.command,
            exit_code: execution.exit_code,
            timed_out: execution.timed_out,
            duration_seconds: duration,
            stdout_lines,
            stderr_lines,
            combined_output,
            log_errors: 0,
        })
    }
}

/// Two-phase termination: SIGTERM, grace period, then SIGKILL
async fn terminate_child(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: pid comes from a live child handle we own; kill(2) with
            // SIGTERM on a dead pid is harmless (returns ESRCH)
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
            if tokio::time::timeout(KILL_GRACE_PERIOD, child.wait())
                .await
                .is_ok()
            {
                return;
            }
        }
    }

    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill timed-out subprocess");
    }
    let _ = child.wait().await;
}
