//! Artifact retrieval: single files and tarball bundles.

use super::PageArchiver;
use crate::db::SaveRow;
use crate::types::ArchiveRetrieveRequest;
use crate::utils::{mime_for_extension, sanitize_identifier};
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// What a retrieve request resolved to
#[derive(Debug)]
pub enum RetrievedArtifact {
    /// A single artifact file to stream back
    File {
        /// Path of the artifact on local disk
        path: PathBuf,
        /// Best-effort MIME type
        media_type: &'static str,
        /// Suggested download filename
        filename: String,
    },
    /// A gzip tarball of all successful artifacts, grouped by archiver
    Bundle {
        /// The tar.gz bytes
        bytes: Vec<u8>,
        /// Suggested download filename
        filename: String,
    },
}

impl PageArchiver {
    /// Resolve a retrieve request to a file or a tarball bundle
    ///
    /// A specific archiver returns that archiver's latest successful
    /// artifact; `"all"` (the default) bundles every successful artifact
    /// into a tar.gz with entries named `<archiver>/<filename>`.
    pub async fn retrieve(&self, request: ArchiveRetrieveRequest) -> Result<RetrievedArtifact> {
        let archiver_name = request
            .archiver
            .as_deref()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| "all".to_string());
        let safe_id = request
            .id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(sanitize_identifier)
            .filter(|s| !s.is_empty());
        let url = request.url.as_deref().filter(|u| !u.is_empty());

        if safe_id.is_none() && url.is_none() {
            return Err(Error::Validation("id or url is required".into()));
        }

        tracing::info!(
            archiver = %archiver_name,
            item_id = safe_id.as_deref(),
            url,
            "Retrieve request"
        );

        let artifacts = self
            .collect_successful_artifacts(safe_id.as_deref(), url)
            .await?;

        if archiver_name != "all" {
            let artifact = artifacts
                .iter()
                .filter(|a| a.archiver == archiver_name)
                .max_by_key(|a| a.id)
                .ok_or_else(|| Error::NotFound("url not archived".into()))?;
            let saved_path = artifact
                .saved_path
                .as_deref()
                .ok_or_else(|| Error::NotFound("url not archived".into()))?;

            let path = PathBuf::from(saved_path);
            if !path.exists() {
                return Err(Error::NotFound("archived file not available".into()));
            }

            let base_label = safe_id
                .or_else(|| url.map(sanitize_identifier))
                .unwrap_or_else(|| "archive".into());
            let suffix = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{e}"))
                .unwrap_or_default();

            return Ok(RetrievedArtifact::File {
                media_type: mime_for_extension(&path),
                filename: format!("{base_label}-{}{suffix}", artifact.archiver),
                path,
            });
        }

        // Bundle: latest successful artifact per archiver, existing files only
        let mut files: Vec<(String, PathBuf)> = Vec::new();
        for artifact in &artifacts {
            let Some(saved_path) = artifact.saved_path.as_deref() else {
                continue;
            };
            let path = PathBuf::from(saved_path);
            if path.exists() {
                files.push((artifact.archiver.clone(), path));
            }
        }
        if files.is_empty() {
            return Err(Error::NotFound("url not archived".into()));
        }

        let bundle_label = safe_id
            .or_else(|| url.map(sanitize_identifier))
            .unwrap_or_else(|| "archive".into());
        let filename = format!("{bundle_label}-artifacts.tar.gz");
        let bytes = build_bundle(files).await?;

        Ok(RetrievedArtifact::Bundle { bytes, filename })
    }

    /// Latest successful artifact per archiver for an id and/or url
    async fn collect_successful_artifacts(
        &self,
        safe_id: Option<&str>,
        url: Option<&str>,
    ) -> Result<Vec<SaveRow>> {
        let mut rows: Vec<SaveRow> = Vec::new();
        if let Some(id) = safe_id {
            rows.extend(self.db.get_saves_by_item_id(id).await?);
        }
        if let Some(url) = url {
            rows.extend(self.db.get_saves_by_url(url).await?);
        }

        let mut latest: HashMap<String, SaveRow> = HashMap::new();
        for row in rows {
            if !row.success || row.saved_path.is_none() {
                continue;
            }
            match latest.get(&row.archiver) {
                Some(current) if current.id >= row.id => {}
                _ => {
                    latest.insert(row.archiver.clone(), row);
                }
            }
        }

        let mut result: Vec<SaveRow> = latest.into_values().collect();
        result.sort_by_key(|r| r.id);
        Ok(result)
    }
}

/// Assemble a tar.gz with entries `<archiver>/<filename>`
async fn build_bundle(files: Vec<(String, PathBuf)>) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (archiver, path) in &files {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("output");
            let entry_name = format!("{archiver}/{file_name}");
            builder.append_path_with_name(path, entry_name)?;
        }

        let encoder = builder.into_inner()?;
        Ok::<Vec<u8>, std::io::Error>(encoder.finish()?)
    })
    .await
    .map_err(|e| Error::Other(format!("bundle task failed: {e}")))?
    .map_err(Error::Io)
}
