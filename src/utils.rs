//! Utility functions for identifier sanitization, URL handling, and path pruning

use crate::config::PaywallConfig;
use std::path::Path;

/// Maximum length of a sanitized identifier
const MAX_IDENTIFIER_LEN: usize = 200;

/// Sanitize a client-supplied identifier for filesystem use
///
/// Path separators, whitespace, wildcards, control characters and anything
/// else outside `[A-Za-z0-9._-]` are replaced with `_`; leading dots and
/// underscores are stripped; the result is capped at 200 characters. The
/// function is idempotent: `sanitize_identifier(sanitize_identifier(x)) ==
/// sanitize_identifier(x)`.
///
/// An empty result means the input carried no usable characters and should be
/// rejected by the caller.
pub fn sanitize_identifier(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = mapped.trim_start_matches(['.', '_']);
    let mut out = trimmed.to_string();
    out.truncate(MAX_IDENTIFIER_LEN);
    out
}

/// Remove empty parent directories of `path` up to (never including) `root`
///
/// Stops at the first non-empty directory or any removal error. Used after
/// artifact deletion so `<data_dir>/<item>/<archiver>` trees don't accumulate
/// empty shells.
pub fn prune_empty_parents(path: &Path, root: &Path) {
    let Ok(root) = root.canonicalize() else {
        return;
    };

    let mut parent = path.parent().map(|p| p.to_path_buf());
    while let Some(dir) = parent {
        let Ok(canonical) = dir.canonicalize() else {
            break;
        };
        if canonical == root || !canonical.starts_with(&root) {
            break;
        }
        if std::fs::remove_dir(&canonical).is_err() {
            // Not empty (or not removable) - stop pruning here
            break;
        }
        parent = dir.parent().map(|p| p.to_path_buf());
    }
}

/// Rewrite a URL through the configured paywall wrapper when its host matches
///
/// Returns the input unchanged when rewriting is disabled, the URL does not
/// parse, the host does not match, or the URL is already wrapped.
pub fn rewrite_paywalled_url(raw_url: &str, paywall: &PaywallConfig) -> String {
    if !paywall.enabled {
        return raw_url.to_string();
    }

    let Ok(parsed) = url::Url::parse(raw_url) else {
        return raw_url.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return raw_url.to_string();
    };

    // Already wrapped
    if let Ok(wrapper) = url::Url::parse(&paywall.wrapper_base) {
        if wrapper.host_str() == Some(host) {
            return raw_url.to_string();
        }
    }

    let matches = paywall
        .hosts
        .iter()
        .any(|h| host == h || host.ends_with(&format!(".{h}")));
    if !matches {
        return raw_url.to_string();
    }

    format!("{}/{}", paywall.wrapper_base.trim_end_matches('/'), raw_url)
}

/// Extract the original URL from a paywall-wrapper URL
///
/// Wrapper URLs carry the real URL as their path suffix
/// (`https://wrapper.example/https://medium.com/story`). Returns `None` when
/// the URL is not a wrapper URL or carries no embedded URL.
pub fn extract_original_url(wrapped_url: &str, paywall: &PaywallConfig) -> Option<String> {
    let wrapper = url::Url::parse(&paywall.wrapper_base).ok()?;
    let parsed = url::Url::parse(wrapped_url).ok()?;
    if parsed.host_str() != wrapper.host_str() {
        return None;
    }

    let path = parsed.path().trim_start_matches('/');
    let re = regex::Regex::new(r"^(https?):/{1,2}(.+)$").ok()?;
    let caps = re.captures(path)?;
    let candidate = format!("{}://{}", &caps[1], &caps[2]);
    url::Url::parse(&candidate).ok()?;
    Some(candidate)
}

/// Probe a URL's reachability and return the HTTP status code
///
/// Tries HEAD first; falls back to GET when the server rejects HEAD (405) or
/// the request errors. Returns `None` when the URL is unreachable entirely.
pub async fn probe_url_status(client: &reqwest::Client, url: &str) -> Option<u16> {
    match client.head(url).send().await {
        Ok(resp) if resp.status().as_u16() != 405 => Some(resp.status().as_u16()),
        _ => match client.get(url).send().await {
            Ok(resp) => Some(resp.status().as_u16()),
            Err(_) => None,
        },
    }
}

/// Whether `path` resolves to a location inside `root`
///
/// Used before deleting recorded artifact paths so a tampered catalog row
/// can never point file removal outside the data directory.
pub fn path_within(path: &Path, root: &Path) -> bool {
    match (path.canonicalize(), root.canonicalize()) {
        (Ok(path), Ok(root)) => path.starts_with(root),
        _ => false,
    }
}

/// Best-effort MIME type for an artifact file extension
pub fn mime_for_extension(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("html") | Some("htm") => "text/html",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("gz") => "application/gzip",
        _ => "application/octet-stream",
    }
}
