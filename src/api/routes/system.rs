//! System handlers: health, OpenAPI, and the SSE event stream.

use crate::api::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::IntoResponse,
};
use futures::Stream;
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use utoipa::OpenApi;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is up")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// GET /healthz - Kubernetes-style health check alias
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "system",
    responses(
        (status = 200, description = "Service is up")
    )
)]
pub async fn healthz_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI 3 document")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    (StatusCode::OK, Json(crate::api::ApiDoc::openapi()))
}

/// GET /events - Server-sent archival event stream
///
/// Each event is one JSON-encoded [`crate::types::Event`]. Subscribers that
/// lag behind the broadcast buffer miss events rather than stalling the
/// pipeline.
#[utoipa::path(
    get,
    path = "/events",
    tag = "system",
    responses(
        (status = 200, description = "text/event-stream of archival events")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.archiver.subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|result| async move {
        match result {
            Ok(event) => {
                let json = serde_json::to_string(&event).ok()?;
                Some(Ok(SseEvent::default().data(json)))
            }
            // Lagged subscribers skip ahead instead of erroring the stream
            Err(_) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
