//! Full-page screenshot archiver (chromium `--screenshot`).

use super::chromium::{ChromiumCommandBuilder, ChromiumSession};
use super::{Archiver, ArchiverCore, quote_command, resolve_binary};
use crate::command_runner::CommandRequest;
use crate::types::ArchiveResult;
use crate::Result;
use async_trait::async_trait;

/// Captures a tall-viewport PNG of the rendered page
///
/// The CLI screenshot path does not do a true full-page capture; the
/// configured viewport height (default 8000px) covers most article pages.
pub struct ScreenshotArchiver {
    core: ArchiverCore,
    chromium: ChromiumSession,
    builder: ChromiumCommandBuilder,
}

impl ScreenshotArchiver {
    /// Construct, resolving the chromium binary
    pub fn new(core: ArchiverCore) -> Result<Self> {
        let config = core.config().clone();
        let chromium_bin = resolve_binary(
            &config.browser.chromium_bin,
            "chromium",
            config.browser.search_path,
        )?;
        let chromium = ChromiumSession::new(&config, core.runner().clone());
        let builder = ChromiumCommandBuilder::new(config, chromium_bin);
        Ok(Self {
            core,
            chromium,
            builder,
        })
    }
}

#[async_trait]
impl Archiver for ScreenshotArchiver {
    fn name(&self) -> &'static str {
        "screenshot"
    }

    fn output_extension(&self) -> &'static str {
        "png"
    }

    async fn archive(&self, url: &str, item_id: &str) -> Result<ArchiveResult> {
        let (_out_dir, out_path) = self
            .core
            .output_paths(self.name(), self.output_extension(), item_id)
            .await?;

        tracing::info!(item_id, url, archiver = self.name(), "Archiving URL");

        self.chromium.prepare().await?;

        let args = self.builder.screenshot_args(url, &out_path);
        let command = quote_command(&args);
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
