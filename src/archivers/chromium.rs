//! Chromium command construction and session lifecycle
//!
//! The browser-backed archivers share a user-data directory, which chromium
//! guards with singleton lock files. Crashed runs leave those locks behind,
//! so every launch is preceded by lock removal, and every timeout is followed
//! by a pkill sweep (recorded through the command runner so post-mortems see
//! it).

use crate::command_runner::{CommandRequest, CommandRunner};
use crate::config::Config;
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Singleton lock files chromium writes into its user-data directory
const SINGLETON_LOCKS: &[&str] = &["SingletonLock", "SingletonCookie", "SingletonSocket"];

/// Timeout for the post-timeout pkill sweep
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Builder for chromium command argument lists
pub struct ChromiumCommandBuilder {
    config: Arc<Config>,
    chromium_bin: PathBuf,
    user_data_dir: PathBuf,
}

impl ChromiumCommandBuilder {
    /// Create a builder with a resolved chromium binary
    pub fn new(config: Arc<Config>, chromium_bin: PathBuf) -> Self {
        let user_data_dir = config.browser.resolved_user_data_dir(config.data_dir());
        Self {
            config,
            chromium_bin,
            user_data_dir,
        }
    }

    /// Common base arguments for all chromium invocations
    pub fn base_args(&self, incognito: bool) -> Vec<String> {
        let mut args = vec![
            self.chromium_bin.display().to_string(),
            "--headless=new".to_string(),
            format!("--user-data-dir={}", self.user_data_dir.display()),
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-software-rasterizer".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--disable-features=NetworkService,NetworkServiceInProcess".to_string(),
        ];

        if let Some(profile) = &self.config.browser.profile_directory {
            if !profile.trim().is_empty() {
                args.push(format!("--profile-directory={profile}"));
            }
        }

        if incognito {
            args.push("--incognito".to_string());
        }

        args
    }

    /// Arguments for DOM dumping (readability extraction)
    pub fn dump_dom_args(&self, url: &str) -> Vec<String> {
        let mut args = self.base_args(false);
        args.extend([
            "--dump-dom".to_string(),
            "--run-all-compositor-stages-before-draw".to_string(),
            format!(
                "--virtual-time-budget={}",
                self.config.browser.virtual_time_budget_ms
            ),
            "--hide-scrollbars".to_string(),
            url.to_string(),
        ]);
        args
    }

    /// Arguments for a full-page screenshot
    pub fn screenshot_args(&self, url: &str, output_path: &Path) -> Vec<String> {
        let mut args = self.base_args(false);
        args.extend([
            format!("--screenshot={}", output_path.display()),
            format!(
                "--window-size={},{}",
                self.config.browser.viewport_width, self.config.browser.viewport_height
            ),
            "--run-all-compositor-stages-before-draw".to_string(),
            format!(
                "--virtual-time-budget={}",
                self.config.browser.virtual_time_budget_ms
            ),
            "--hide-scrollbars".to_string(),
            url.to_string(),
        ]);
        args
    }

    /// Arguments for print-to-PDF
    pub fn pdf_args(&self, url: &str, output_path: &Path) -> Vec<String> {
        let mut args = self.base_args(false);
        args.extend([
            format!("--print-to-pdf={}", output_path.display()),
            "--print-to-pdf-no-header".to_string(),
            "--run-all-compositor-stages-before-draw".to_string(),
            format!(
                "--virtual-time-budget={}",
                self.config.browser.virtual_time_budget_ms
            ),
            url.to_string(),
        ]);
        args
    }

    /// Arguments for DOM dumping to pipe into monolith (incognito)
    pub fn dump_dom_for_monolith_args(&self, url: &str) -> Vec<String> {
        let mut args = self.base_args(true);
        args.extend([
            "--window-size=1920,1080".to_string(),
            "--run-all-compositor-stages-before-draw".to_string(),
            format!(
                "--virtual-time-budget={}",
                self.config.browser.virtual_time_budget_ms
            ),
            "--dump-dom".to_string(),
            url.to_string(),
        ]);
        args
    }
}

/// Shared chromium setup/teardown, owned by each browser-backed archiver
#[derive(Clone)]
pub struct ChromiumSession {
    user_data_dir: PathBuf,
    runner: CommandRunner,
}

impl ChromiumSession {
    /// Create a session helper bound to the shared user-data directory
    pub fn new(config: &Config, runner: CommandRunner) -> Self {
        Self {
            user_data_dir: config.browser.resolved_user_data_dir(config.data_dir()),
            runner,
        }
    }

    /// Prepare the user-data directory and remove stale singleton locks
    pub async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.user_data_dir).await?;
        self.remove_singleton_locks().await;
        Ok(())
    }

    /// Remove singleton lock files left by a previous (possibly crashed) run
    pub async fn remove_singleton_locks(&self) {
        for lock in SINGLETON_LOCKS {
            let path = self.user_data_dir.join(lock);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(lock = *lock, "Removed stale chromium singleton lock");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        lock = *lock,
                        error = %e,
                        "Failed to remove chromium singleton lock"
                    );
                }
            }
        }
    }

    /// Kill stray chromium processes after a timed-out run
    ///
    /// Goes through the command runner so the sweep lands in the execution
    /// log next to the run that triggered it.
    pub async fn cleanup_after_timeout(&self, archiver: &str) {
        let cmd = "pkill -f 'chromium' >/dev/null 2>&1 || true; \
                   pkill -f 'chrome' >/dev/null 2>&1 || true; true";
        let request =
            CommandRequest::new(cmd, CLEANUP_TIMEOUT).with_context(None, archiver);
        if let Err(e) = self.runner.execute(request).await {
            tracing::warn!(error = %e, "Post-timeout chromium cleanup failed");
        }
        self.remove_singleton_locks().await;
    }
}
