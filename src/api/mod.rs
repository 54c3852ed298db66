//! REST API server module
//!
//! A thin adapter over the orchestration kernel: handlers validate input,
//! call one [`PageArchiver`] operation, and map the result (or error) onto
//! the HTTP surface. Provides OpenAPI documentation and an SSE event stream.

use crate::{Config, PageArchiver, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Archival
/// - `POST /archive/:archiver` - Synchronous single-archiver run ('all' runs every archiver)
/// - `POST /archive/:archiver/batch` - Batch enqueue for one archiver
/// - `POST /save` - Enqueue the full pipeline for one URL
/// - `POST /save/batch` - Batch enqueue for the full pipeline
/// - `POST /archive/retrieve` - Stream one artifact or a tar.gz bundle
/// - `GET /archive/:archived_url_id/size` - Size statistics
///
/// ## Tasks
/// - `GET /tasks/:task_id` - Aggregate task status
///
/// ## Admin
/// - `GET /admin/saves` - Paginated artifact listing
/// - `GET /admin/archivers` - Registered archiver names
/// - `DELETE /admin/saves/:rowid` - Delete one row (`?remove_files=`)
/// - `DELETE /admin/saves/by-item/:item_id` - Delete an item's rows
/// - `DELETE /admin/saves/by-url?url=` - Delete a URL's rows
/// - `POST /admin/saves/:rowid/requeue` - Reset to pending and re-run
/// - `POST /admin/summarize` - Re-notify summarization
///
/// ## System
/// - `GET /health`, `GET /healthz` - Health checks
/// - `GET /events` - Server-sent archival events
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive documentation (if enabled)
pub fn create_router(archiver: Arc<PageArchiver>, config: Arc<Config>) -> Router {
    let state = AppState::with_config(archiver, config.clone());

    let router = Router::new()
        // Archival
        .route("/archive/retrieve", post(routes::retrieve_archive))
        // The first segment parameter must share one name across these
        // routes (the router rejects sibling parameters with different
        // names); the size handler extracts it positionally as an id
        .route("/archive/:archiver", post(routes::archive_with))
        .route("/archive/:archiver/batch", post(routes::archive_with_batch))
        .route("/archive/:archiver/size", get(routes::archive_size))
        .route("/save", post(routes::save_default))
        .route("/save/batch", post(routes::save_default_batch))
        // Tasks
        .route("/tasks/:task_id", get(routes::get_task_status))
        // Admin
        .route("/admin/saves", get(routes::list_saves))
        .route("/admin/archivers", get(routes::list_archivers))
        .route("/admin/saves/by-url", delete(routes::delete_saves_by_url))
        .route("/admin/saves/:rowid", delete(routes::delete_save))
        .route(
            "/admin/saves/by-item/:item_id",
            delete(routes::delete_saves_by_item),
        )
        .route("/admin/saves/:rowid/requeue", post(routes::requeue_save))
        .route("/admin/summarize", post(routes::summarize_article))
        // System
        .route("/health", get(routes::health_check))
        .route("/healthz", get(routes::healthz_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // Merge Swagger UI routes if enabled in config (before applying state)
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    // Apply authentication middleware if an API key is configured; the
    // liveness probes stay exempt (see `auth`)
    let router = if config.server.api.api_key.is_some() {
        router.layer(middleware::from_fn_with_state(
            config.server.api.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        router
    };

    // Apply CORS middleware if enabled in config
    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins ("*" allows any)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Creates a TCP listener, binds it, and serves the router until shutdown.
pub async fn start_api_server(archiver: Arc<PageArchiver>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(archiver, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
