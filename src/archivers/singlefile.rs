//! Single-file capture archiver (single-file CLI).

use super::chromium::ChromiumSession;
use super::{Archiver, ArchiverCore, quote_command, resolve_binary};
use crate::command_runner::CommandRequest;
use crate::types::ArchiveResult;
use crate::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Invokes the single-file CLI, which drives its own browser instance
///
/// The browser executable is forwarded so single-file shares the chromium
/// install (and therefore the serialized-execution requirement) with the
/// other archivers.
pub struct SingleFileArchiver {
    core: ArchiverCore,
    chromium: ChromiumSession,
    singlefile_bin: PathBuf,
    chromium_bin: PathBuf,
}

impl SingleFileArchiver {
    /// Construct, resolving the single-file and chromium binaries
    pub fn new(core: ArchiverCore) -> Result<Self> {
        let config = core.config().clone();
        let singlefile_bin = resolve_binary(
            &config.browser.singlefile_bin,
            "single-file",
            config.browser.search_path,
        )?;
        let chromium_bin = resolve_binary(
            &config.browser.chromium_bin,
            "chromium",
            config.browser.search_path,
        )?;
        let chromium = ChromiumSession::new(&config, core.runner().clone());
        Ok(Self {
            core,
            chromium,
            singlefile_bin,
            chromium_bin,
        })
    }
}

#[async_trait]
impl Archiver for SingleFileArchiver {
    fn name(&self) -> &'static str {
        "singlefile"
    }

    fn output_extension(&self) -> &'static str {
        "html"
    }

    async fn archive(&self, url: &str, item_id: &str) -> Result<ArchiveResult> {
        let (_out_dir, out_path) = self
            .core
            .output_paths(self.name(), self.output_extension(), item_id)
            .await?;

        tracing::info!(item_id, url, archiver = self.name(), "Archiving URL");

        self.chromium.prepare().await?;

        let command = quote_command(&[
            self.singlefile_bin.display().to_string(),
            format!(
                "--browser-executable-path={}",
                self.chromium_bin.display()
            ),
            "--browser-args=[\"--headless=new\",\"--no-sandbox\"]".to_string(),
            url.to_string(),
            out_path.display().to_string(),
        ]);

        let result = self
            .core
            .runner()
            .execute(
                CommandRequest::new(command, self.core.config().browser.archive_timeout)
                    .with_context(None, self.name()),
            )
            .await?;

        if result.timed_out {
            self.cleanup_after_timeout().await;
            return Ok(ArchiveResult::failed(result.exit_code));
        }

        self.chromium.remove_singleton_locks().await;

        Ok(self.core.create_result(&out_path, result.exit_code, None))
    }

    async fn cleanup_after_timeout(&self) {
        self.chromium.cleanup_after_timeout(self.name()).await;
    }
}
