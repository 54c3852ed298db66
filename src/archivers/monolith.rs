//! Self-contained HTML archiver (chromium DOM dump piped into monolith).

use super::chromium::{ChromiumCommandBuilder, ChromiumSession};
use super::{Archiver, ArchiverCore, quote_command, resolve_binary};
use crate::command_runner::CommandRequest;
use crate::types::ArchiveResult;
use crate::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Pipes the rendered DOM into monolith to inline every asset
///
/// The DOM dump runs incognito so page state never leaks into the shared
/// profile; monolith resolves relative assets against the original URL.
pub struct MonolithArchiver {
    core: ArchiverCore,
    chromium: ChromiumSession,
    builder: ChromiumCommandBuilder,
    monolith_bin: PathBuf,
}

impl MonolithArchiver {
    /// Construct, resolving the chromium and monolith binaries
    pub fn new(core: ArchiverCore) -> Result<Self> {
        let config = core.config().clone();
        let chromium_bin = resolve_binary(
            &config.browser.chromium_bin,
            "chromium",
            config.browser.search_path,
        )?;
        let monolith_bin = resolve_binary(
            &config.browser.monolith_bin,
            "monolith",
            config.browser.search_path,
        )?;
        let chromium = ChromiumSession::new(&config, core.runner().clone());
        let builder = ChromiumCommandBuilder::new(config, chromium_bin);
        Ok(Self {
            core,
            chromium,
            builder,
            monolith_bin,
        })
    }
}

#[async_trait]
impl Archiver for MonolithArchiver {
    fn name(&self) -> &'static str {
        "monolith"
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

        let dump = quote_command(&self.builder.dump_dom_for_monolith_args(url));
        let monolith = quote_command(&[
            self.monolith_bin.display().to_string(),
            "-".to_string(),
            "-b".to_string(),
            url.to_string(),
            "-o".to_string(),
            out_path.display().to_string(),
        ]);
        let command = format!("{dump} | {monolith}");

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
