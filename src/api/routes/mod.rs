//! Route handlers, organized by surface.

pub mod admin;
pub mod archive;
pub mod system;
pub mod tasks;

pub use admin::{
    delete_save, delete_saves_by_item, delete_saves_by_url, list_archivers, list_saves,
    requeue_save, summarize_article,
};
pub use archive::{
    archive_size, archive_with, archive_with_batch, retrieve_archive, save_default,
    save_default_batch,
};
pub use system::{event_stream, health_check, healthz_check, openapi_spec};
pub use tasks::get_task_status;

use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters for paginated listings
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Maximum rows to return (default: 200)
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Rows to skip (default: 0)
    #[serde(default)]
    pub offset: i64,
}

/// Query parameters for delete endpoints
#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteQuery {
    /// Also remove artifact files from local disk (default: false)
    #[serde(default)]
    pub remove_files: bool,
}

/// Query parameters for URL-keyed delete endpoints
#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteByUrlQuery {
    /// URL whose artifacts should be deleted
    pub url: String,
    /// Also remove artifact files from local disk (default: false)
    #[serde(default)]
    pub remove_files: bool,
}

fn default_limit() -> i64 {
    200
}
