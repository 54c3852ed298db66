//! Summarization notification
//!
//! The kernel only tells the summarization subsystem that a readability
//! artifact completed; scheduling, retries, and model choice live on the
//! other side of the webhook. The notifier interface is deliberately one
//! method so the summarization side never needs a reference back into the
//! orchestrator.

use crate::config::SummarizationConfig;
use serde::Serialize;

/// Downstream collaborator notified of completed readability artifacts
///
/// Implementations are free to drop or schedule; `schedule` returns whether
/// the notification was accepted for delivery.
pub trait SummarizationNotifier: Send + Sync {
    /// Request summarization of an artifact row
    fn schedule(&self, rowid: i64, archived_url_id: Option<i64>, reason: &str) -> bool;
}

/// JSON payload delivered to the summarization webhook
#[derive(Debug, Clone, Serialize)]
struct SummarizationPayload {
    rowid: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    archived_url_id: Option<i64>,
    reason: String,
    timestamp: i64,
}

/// Webhook-backed notifier: POSTs the request, fire and forget
///
/// Errors are logged and swallowed; a lost notification only delays a
/// summary, never an archive.
pub struct WebhookSummarizationNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl WebhookSummarizationNotifier {
    /// Build the notifier from configuration; `None` when no URL is set
    pub fn from_config(config: &SummarizationConfig) -> Option<Self> {
        let webhook_url = config.webhook_url.clone()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .ok()?;
        Some(Self {
            client,
            webhook_url,
        })
    }
}

impl SummarizationNotifier for WebhookSummarizationNotifier {
    fn schedule(&self, rowid: i64, archived_url_id: Option<i64>, reason: &str) -> bool {
        let payload = SummarizationPayload {
            rowid,
            archived_url_id,
            reason: reason.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        let client = self.client.clone();
        let url = self.webhook_url.clone();

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(
                        rowid = payload.rowid,
                        reason = %payload.reason,
                        "Summarization webhook delivered"
                    );
                }
                Ok(response) => {
                    tracing::warn!(
                        rowid = payload.rowid,
                        status = response.status().as_u16(),
                        "Summarization webhook rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        rowid = payload.rowid,
                        error = %e,
                        "Summarization webhook failed"
                    );
                }
            }
        });

        true
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Notifier that records every schedule call
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) calls: Mutex<Vec<(i64, Option<i64>, String)>>,
    }

    impl SummarizationNotifier for RecordingNotifier {
        fn schedule(&self, rowid: i64, archived_url_id: Option<i64>, reason: &str) -> bool {
            self.calls
                .lock()
                .unwrap()
                .push((rowid, archived_url_id, reason.to_string()));
            true
        }
    }
}
