//! Readability extraction archiver (DOM dump + readability CLI).

use super::chromium::{ChromiumCommandBuilder, ChromiumSession};
use super::{Archiver, ArchiverCore, quote_command, resolve_binary};
use crate::command_runner::CommandRequest;
use crate::types::{ArchiveResult, PageMetadata};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Words per minute used for the reading-time estimate
const READING_WPM: i64 = 200;

/// JSON document emitted by the readability extraction CLI
#[derive(Debug, Deserialize)]
struct ReadabilityOutput {
    content: Option<String>,
    title: Option<String>,
    byline: Option<String>,
    excerpt: Option<String>,
    #[serde(rename = "siteName")]
    site_name: Option<String>,
    lang: Option<String>,
    #[serde(rename = "textContent")]
    text_content: Option<String>,
}

/// Extracts the article body and structured metadata from the rendered DOM
///
/// Two subprocess steps: chromium dumps the DOM to a scratch file, then the
/// readability CLI turns it into a JSON document with the cleaned HTML and
/// metadata. The cleaned HTML becomes the artifact; the metadata is returned
/// for the caller to persist alongside it.
pub struct ReadabilityArchiver {
    core: ArchiverCore,
    chromium: ChromiumSession,
    builder: ChromiumCommandBuilder,
    readability_bin: PathBuf,
}

impl ReadabilityArchiver {
    /// Construct, resolving the chromium and readability binaries
    pub fn new(core: ArchiverCore) -> Result<Self> {
        let config = core.config().clone();
        let chromium_bin = resolve_binary(
            &config.browser.chromium_bin,
            "chromium",
            config.browser.search_path,
        )?;
        let readability_bin = resolve_binary(
            &config.browser.readability_bin,
            "readability-extractor",
            config.browser.search_path,
        )?;
        let chromium = ChromiumSession::new(&config, core.runner().clone());
        let builder = ChromiumCommandBuilder::new(config, chromium_bin);
        Ok(Self {
            core,
            chromium,
            builder,
            readability_bin,
        })
    }

    /// Parse the extraction JSON and write the cleaned HTML artifact
    async fn materialize_output(
        &self,
        json_path: &Path,
        out_path: &Path,
    ) -> Result<Option<PageMetadata>> {
        let raw = tokio::fs::read(json_path).await?;
        let parsed: ReadabilityOutput = match serde_json::from_slice(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Readability output is not parseable JSON");
                return Ok(None);
            }
        };

        let Some(content) = parsed.content.filter(|c| !c.is_empty()) else {
            tracing::warn!("Readability output carries no content");
            return Ok(None);
        };
        tokio::fs::write(out_path, &content).await?;

        let word_count = parsed
            .text_content
            .as_deref()
            .map(|t| t.split_whitespace().count() as i64);
        let reading_time_minutes =
            word_count.map(|w| (w + READING_WPM - 1).max(READING_WPM) / READING_WPM);

        Ok(Some(PageMetadata {
            title: parsed.title,
            byline: parsed.byline,
            excerpt: parsed.excerpt,
            site_name: parsed.site_name,
            lang: parsed.lang,
            text_content: parsed.text_content,
            word_count,
            reading_time_minutes,
        }))
    }
}

#[async_trait]
impl Archiver for ReadabilityArchiver {
    fn name(&self) -> &'static str {
        "readability"
    }

    fn output_extension(&self) -> &'static str {
        "html"
    }

    async fn archive(&self, url: &str, item_id: &str) -> Result<ArchiveResult> {
        let (out_dir, out_path) = self
            .core
            .output_paths(self.name(), self.output_extension(), item_id)
            .await?;
        let dom_path = out_dir.join("dom.html");
        let json_path = out_dir.join("article.json");

        tracing::info!(item_id, url, archiver = self.name(), "Archiving URL");

        self.chromium.prepare().await?;

        // Step 1: render and dump the DOM
        let dump = quote_command(&self.builder.dump_dom_args(url));
        let dump_cmd = format!(
            "{dump} > {}",
            shlex::try_quote(&dom_path.display().to_string())
                .map(|q| q.into_owned())
                .unwrap_or_default()
        );
        let dump_result = self
            .core
            .runner()
            .execute(
                CommandRequest::new(dump_cmd, self.core.config().browser.archive_timeout)
                    .with_context(None, self.name()),
            )
            .await?;

        if dump_result.timed_out {
            self.cleanup_after_timeout().await;
            return Ok(ArchiveResult::failed(dump_result.exit_code));
        }
        self.chromium.remove_singleton_locks().await;
        if dump_result.exit_code != Some(0) {
            return Ok(ArchiveResult::failed(dump_result.exit_code));
        }

        // Step 2: readability extraction to JSON
        let extract = quote_command(&[
            self.readability_bin.display().to_string(),
            dom_path.display().to_string(),
            url.to_string(),
        ]);
        let extract_cmd = format!(
            "{extract} > {}",
            shlex::try_quote(&json_path.display().to_string())
                .map(|q| q.into_owned())
                .unwrap_or_default()
        );
        let extract_result = self
            .core
            .runner()
            .execute(
                CommandRequest::new(extract_cmd, self.core.config().browser.archive_timeout)
                    .with_context(None, self.name()),
            )
            .await?;

        if extract_result.timed_out {
            self.cleanup_after_timeout().await;
            return Ok(ArchiveResult::failed(extract_result.exit_code));
        }
        if extract_result.exit_code != Some(0) {
            return Ok(ArchiveResult::failed(extract_result.exit_code));
        }

        let metadata = self.materialize_output(&json_path, &out_path).await?;
        if metadata.is_none() {
            // Unparseable extraction fails the run even with exit 0
            return Ok(ArchiveResult::failed(extract_result.exit_code));
        }

        // Scratch files are not part of the artifact
        let _ = tokio::fs::remove_file(&dom_path).await;
        let _ = tokio::fs::remove_file(&json_path).await;

        Ok(self
            .core
            .create_result(&out_path, extract_result.exit_code, metadata))
    }

    async fn cleanup_after_timeout(&self) {
        self.chromium.cleanup_after_timeout(self.name()).await;
    }
}
