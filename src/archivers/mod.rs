//! Archiver strategies
//!
//! An archiver turns `(url, item_id)` into a single artifact file at the
//! well-known path `<data_dir>/<sanitized_id>/<archiver>/output.<ext>`.
//! Five variants ship: `monolith`, `readability`, `singlefile`, `screenshot`
//! and `pdf`. Browser-backed variants share a [`chromium`] session helper by
//! composition.
//!
//! The [`pipeline::ArchivePipeline`] wraps an archiver run with the storage
//! fan-out, catalog promotion, and cleanup scheduling.

use crate::command_runner::CommandRunner;
use crate::config::Config;
use crate::types::{ArchiveResult, PageMetadata};
use crate::utils::sanitize_identifier;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod chromium;
mod monolith;
mod pdf;
pub mod pipeline;
mod readability;
mod screenshot;
mod singlefile;

pub use monolith::MonolithArchiver;
pub use pdf::PdfArchiver;
pub use readability::ReadabilityArchiver;
pub use screenshot::ScreenshotArchiver;
pub use singlefile::SingleFileArchiver;

/// A named strategy that archives one URL into one artifact file
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Static identifier used as directory name and catalog key
    fn name(&self) -> &'static str;

    /// Expected file extension of the artifact
    fn output_extension(&self) -> &'static str;

    /// Produce the artifact for `url` keyed by `item_id`
    async fn archive(&self, url: &str, item_id: &str) -> Result<ArchiveResult>;

    /// Hook invoked after a timed-out run, before the worker moves on
    ///
    /// Browser-backed archivers kill stray browser processes here; the
    /// default is a no-op.
    async fn cleanup_after_timeout(&self) {}
}

/// Shared behavior of all archivers, held by composition
///
/// Owns output path construction, the existing-output probe, and the uniform
/// success criterion (exit 0, file at least `min_output_bytes`).
#[derive(Clone)]
pub struct ArchiverCore {
    config: Arc<Config>,
    runner: CommandRunner,
}

impl ArchiverCore {
    /// Create the shared core
    pub fn new(config: Arc<Config>, runner: CommandRunner) -> Self {
        Self { config, runner }
    }

    /// The command runner archiver subprocesses go through
    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    /// Library configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Return `(output_dir, output_file_path)`, creating the directory
    pub async fn output_paths(
        &self,
        archiver: &str,
        extension: &str,
        item_id: &str,
    ) -> Result<(PathBuf, PathBuf)> {
        let safe_item = sanitize_identifier(item_id);
        let out_dir = self.config.data_dir().join(safe_item).join(archiver);
        tokio::fs::create_dir_all(&out_dir).await?;
        let out_path = out_dir.join(format!("output.{extension}"));
        Ok((out_dir, out_path))
    }

    /// Probe for existing output of this archiver for `item_id`
    ///
    /// Checks the standard path and ` (N)`-numbered variants; returns the
    /// first non-empty file found.
    pub async fn has_existing_output(
        &self,
        archiver: &str,
        extension: &str,
        item_id: &str,
    ) -> Option<PathBuf> {
        let safe_item = sanitize_identifier(item_id);
        let out_dir = self.config.data_dir().join(safe_item).join(archiver);

        let standard = out_dir.join(format!("output.{extension}"));
        if non_empty_file(&standard).await {
            return Some(standard);
        }

        let mut entries = tokio::fs::read_dir(&out_dir).await.ok()?;
        let suffix = format!(".{extension}");
        while let Ok(Some(entry)) = entries.next_entry().await {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with("output (") && name.ends_with(&suffix) {
                let path = entry.path();
                if non_empty_file(&path).await {
                    return Some(path);
                }
            }
        }
        None
    }

    /// Apply the uniform success criterion
    pub fn validate_output(&self, path: &Path, exit_code: Option<i32>, min_size: u64) -> bool {
        exit_code == Some(0)
            && std::fs::metadata(path)
                .map(|m| m.is_file() && m.len() >= min_size)
                .unwrap_or(false)
    }

    /// Build a standardized result from an archiver run
    pub fn create_result(
        &self,
        path: &Path,
        exit_code: Option<i32>,
        metadata: Option<PageMetadata>,
    ) -> ArchiveResult {
        let success = self.validate_output(path, exit_code, self.config.archive.min_output_bytes);
        ArchiveResult {
            success,
            exit_code,
            saved_path: success.then(|| path.display().to_string()),
            metadata,
            storage_uploads: Vec::new(),
            all_uploads_succeeded: false,
        }
    }
}

async fn non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Resolve an external binary from config or PATH
pub(crate) fn resolve_binary(
    configured: &Option<PathBuf>,
    binary: &str,
    search_path: bool,
) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.clone());
    }
    if search_path {
        if let Ok(found) = which::which(binary) {
            return Ok(found);
        }
    }
    Err(Error::ExternalTool(format!("{binary} not found in PATH")))
}

/// Join program arguments into a `sh -c` command string
pub(crate) fn quote_command(args: &[String]) -> String {
    args.iter()
        .map(|a| shlex::try_quote(a).map(|q| q.into_owned()).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Construction-time immutable mapping of archiver name to instance
///
/// Built once from the configured (ordered) archiver list; the worker looks
/// up by name and maps the absence case to the unknown-archiver failure.
pub struct ArchiverRegistry {
    archivers: Vec<Arc<dyn Archiver>>,
}

impl ArchiverRegistry {
    /// Build the registry from configuration, in registration order
    pub fn from_config(config: &Arc<Config>, runner: &CommandRunner) -> Result<Self> {
        let mut archivers: Vec<Arc<dyn Archiver>> = Vec::new();
        for name in &config.archive.archivers {
            let core = ArchiverCore::new(config.clone(), runner.clone());
            let archiver: Arc<dyn Archiver> = match name.as_str() {
                "monolith" => Arc::new(MonolithArchiver::new(core)?),
                "readability" => Arc::new(ReadabilityArchiver::new(core)?),
                "singlefile" => Arc::new(SingleFileArchiver::new(core)?),
                "screenshot" => Arc::new(ScreenshotArchiver::new(core)?),
                "pdf" => Arc::new(PdfArchiver::new(core)?),
                other => {
                    return Err(Error::Config {
                        message: format!("unrecognized archiver '{other}' in configuration"),
                        key: Some("archivers".into()),
                    })
                }
            };
            archivers.push(archiver);
        }
        Ok(Self { archivers })
    }

    /// Build a registry from explicit instances (used by tests and embedders)
    pub fn from_archivers(archivers: Vec<Arc<dyn Archiver>>) -> Self {
        Self { archivers }
    }

    /// Look up an archiver by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Archiver>> {
        self.archivers.iter().find(|a| a.name() == name).cloned()
    }

    /// Archiver names in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.archivers.iter().map(|a| a.name()).collect()
    }

    /// Archivers in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Archiver>> {
        self.archivers.iter()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.archivers.is_empty()
    }

    /// Number of registered archivers
    pub fn len(&self) -> usize {
        self.archivers.len()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::{NamedTempFile, TempDir};

    async fn core() -> (ArchiverCore, TempDir, NamedTempFile) {
        let data_dir = TempDir::new().unwrap();
        let db_file = NamedTempFile::new().unwrap();
        let db = Arc::new(Database::new(db_file.path()).await.unwrap());
        let mut config = Config::default();
        config.archive.data_dir = data_dir.path().to_path_buf();
        let runner = CommandRunner::new(db, false);
        (
            ArchiverCore::new(Arc::new(config), runner),
            data_dir,
            db_file,
        )
    }

    #[tokio::test]
    async fn output_paths_create_the_directory_and_sanitize_ids() {
        let (core, data_dir, _f) = core().await;

        let (out_dir, out_path) = core
            .output_paths("monolith", "html", "../weird id")
            .await
            .unwrap();

        assert!(out_dir.is_dir());
        assert!(out_dir.starts_with(data_dir.path()));
        assert_eq!(
            out_dir,
            data_dir.path().join("weird_id").join("monolith"),
            "path separators in the id must not escape the data dir"
        );
        assert_eq!(out_path, out_dir.join("output.html"));
    }

    #[tokio::test]
    async fn existing_output_probe_finds_standard_and_numbered_variants() {
        let (core, data_dir, _f) = core().await;

        assert!(
            core.has_existing_output("pdf", "pdf", "item-a").await.is_none(),
            "nothing exists yet"
        );

        let dir = data_dir.path().join("item-a").join("pdf");
        tokio::fs::create_dir_all(&dir).await.unwrap();

        // Empty file does not count
        tokio::fs::write(dir.join("output.pdf"), b"").await.unwrap();
        assert!(core.has_existing_output("pdf", "pdf", "item-a").await.is_none());

        // Numbered variant with content counts
        tokio::fs::write(dir.join("output (2).pdf"), b"%PDF").await.unwrap();
        let found = core.has_existing_output("pdf", "pdf", "item-a").await;
        assert_eq!(found, Some(dir.join("output (2).pdf")));

        // Standard path wins once present
        tokio::fs::write(dir.join("output.pdf"), b"%PDF-1.7").await.unwrap();
        let found = core.has_existing_output("pdf", "pdf", "item-a").await;
        assert_eq!(found, Some(dir.join("output.pdf")));
    }

    #[tokio::test]
    async fn validate_output_applies_the_uniform_criterion() {
        let (core, data_dir, _f) = core().await;
        let path = data_dir.path().join("artifact.html");
        tokio::fs::write(&path, b"<html>ok</html>").await.unwrap();

        assert!(core.validate_output(&path, Some(0), 1));
        assert!(!core.validate_output(&path, Some(1), 1), "non-zero exit fails");
        assert!(!core.validate_output(&path, None, 1), "missing exit code fails");
        assert!(
            !core.validate_output(&path, Some(0), 1_000_000),
            "undersized artifact fails"
        );
        assert!(
            !core.validate_output(&data_dir.path().join("missing"), Some(0), 1),
            "absent file fails"
        );
    }

    #[tokio::test]
    async fn create_result_records_path_only_on_success() {
        let (core, data_dir, _f) = core().await;
        let path = data_dir.path().join("artifact.html");
        tokio::fs::write(&path, b"<html>ok</html>").await.unwrap();

        let ok = core.create_result(&path, Some(0), None);
        assert!(ok.success);
        assert_eq!(ok.saved_path.as_deref(), Some(path.to_str().unwrap()));

        let failed = core.create_result(&path, Some(2), None);
        assert!(!failed.success);
        assert!(failed.saved_path.is_none());
        assert_eq!(failed.exit_code, Some(2));
    }

    #[test]
    fn quote_command_escapes_shell_metacharacters() {
        let cmd = quote_command(&[
            "/usr/bin/chromium".to_string(),
            "--screenshot=/tmp/out put.png".to_string(),
            "https://example.org/?a=1&b=2".to_string(),
        ]);
        assert!(cmd.starts_with("/usr/bin/chromium"));
        assert!(
            cmd.contains("'--screenshot=/tmp/out put.png'"),
            "spaces must be quoted: {cmd}"
        );
        assert!(
            cmd.contains("'https://example.org/?a=1&b=2'"),
            "ampersands must be quoted: {cmd}"
        );
    }

    #[test]
    fn resolve_binary_prefers_explicit_path() {
        let explicit = resolve_binary(&Some(PathBuf::from("/opt/bin/chromium")), "chromium", true)
            .unwrap();
        assert_eq!(explicit, PathBuf::from("/opt/bin/chromium"));
    }

    #[test]
    fn resolve_binary_errors_when_missing() {
        let result = resolve_binary(&None, "pagevault-nonexistent-binary-xyz", true);
        assert!(matches!(result, Err(Error::ExternalTool(_))));

        let result = resolve_binary(&None, "sh", false);
        assert!(
            matches!(result, Err(Error::ExternalTool(_))),
            "PATH search disabled means unset binaries are errors"
        );
    }

    #[test]
    fn registry_lookup_and_order() {
        use crate::orchestrator::test_helpers::StubArchiver;

        let registry = ArchiverRegistry::from_archivers(vec![
            Arc::new(StubArchiver::ok("monolith", "html")),
            Arc::new(StubArchiver::ok("pdf", "pdf")),
        ]);

        assert_eq!(registry.names(), vec!["monolith", "pdf"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("monolith").is_some());
        assert!(registry.get("webp").is_none());
    }
}
