//! Application state for the API server

use crate::{Config, PageArchiver};
use std::sync::Arc;

/// Per-request handle to the orchestration kernel
///
/// Every handler works through the [`PageArchiver`], so that is the only
/// collaborator carried here. The API configuration is a separate field
/// rather than `archiver.get_config()` on purpose: an embedder can serve
/// one archiver under API settings (bind address, API key, CORS origins)
/// that differ from the ones the archiver was constructed with, and the
/// router must see the serving-time values.
///
/// Cloned per request; both fields are `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// The orchestration kernel behind every route
    pub archiver: Arc<PageArchiver>,

    /// Serving-time configuration (may differ from the archiver's own)
    pub config: Arc<Config>,
}

impl AppState {
    /// State that serves the archiver under its own configuration
    pub fn new(archiver: Arc<PageArchiver>) -> Self {
        let config = archiver.get_config();
        Self { archiver, config }
    }

    /// State with an explicit serving-time configuration override
    pub fn with_config(archiver: Arc<PageArchiver>, config: Arc<Config>) -> Self {
        Self { archiver, config }
    }
}
