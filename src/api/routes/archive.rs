//! Archive submission and retrieval handlers.

use crate::api::AppState;
use crate::orchestrator::RetrievedArtifact;
use crate::types::{ArchiveRetrieveRequest, BatchCreateRequest, SaveRequest};
use crate::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// POST /archive/:archiver - Synchronous single-URL archive
///
/// `archiver="all"` runs every configured archiver sequentially; the
/// response reflects the last archiver's outcome.
#[utoipa::path(
    post,
    path = "/archive/{archiver}",
    tag = "archive",
    params(
        ("archiver" = String, Path, description = "Archiver name, or 'all'")
    ),
    request_body = SaveRequest,
    responses(
        (status = 200, description = "Archive run completed (ok flag carries the outcome)", body = crate::types::SaveResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unknown archiver"),
        (status = 503, description = "Shutting down")
    )
)]
pub async fn archive_with(
    State(state): State<AppState>,
    Path(archiver): Path<String>,
    Json(payload): Json<SaveRequest>,
) -> Result<Response> {
    let response = state.archiver.archive_now(&archiver, payload).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// POST /save - Enqueue the full pipeline for one URL
#[utoipa::path(
    post,
    path = "/save",
    tag = "archive",
    request_body = SaveRequest,
    responses(
        (status = 202, description = "Accepted for asynchronous archiving", body = crate::types::TaskAccepted),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Queue full or shutting down")
    )
)]
pub async fn save_default(
    State(state): State<AppState>,
    Json(payload): Json<SaveRequest>,
) -> Result<Response> {
    let item = crate::types::BatchSaveItem {
        id: payload.id,
        url: payload.url,
        name: payload.name,
    };
    let accepted = state.archiver.enqueue("all", vec![item]).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
}

/// POST /archive/:archiver/batch - Batch enqueue for one archiver (or 'all')
#[utoipa::path(
    post,
    path = "/archive/{archiver}/batch",
    tag = "archive",
    params(
        ("archiver" = String, Path, description = "Archiver name, or 'all'")
    ),
    request_body = BatchCreateRequest,
    responses(
        (status = 202, description = "Accepted for asynchronous archiving", body = crate::types::TaskAccepted),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unknown archiver"),
        (status = 503, description = "Queue full or shutting down")
    )
)]
pub async fn archive_with_batch(
    State(state): State<AppState>,
    Path(archiver): Path<String>,
    Json(payload): Json<BatchCreateRequest>,
) -> Result<Response> {
    let accepted = state.archiver.enqueue(&archiver, payload.items).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
}

/// POST /save/batch - Batch enqueue for the full pipeline
#[utoipa::path(
    post,
    path = "/save/batch",
    tag = "archive",
    request_body = BatchCreateRequest,
    responses(
        (status = 202, description = "Accepted for asynchronous archiving", body = crate::types::TaskAccepted),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Queue full or shutting down")
    )
)]
pub async fn save_default_batch(
    State(state): State<AppState>,
    Json(payload): Json<BatchCreateRequest>,
) -> Result<Response> {
    let accepted = state.archiver.enqueue("all", payload.items).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
}

/// POST /archive/retrieve - Stream one artifact or a tarball bundle
#[utoipa::path(
    post,
    path = "/archive/retrieve",
    tag = "archive",
    request_body = ArchiveRetrieveRequest,
    responses(
        (status = 200, description = "Artifact file or tar.gz bundle"),
        (status = 400, description = "Neither id nor url supplied"),
        (status = 404, description = "Nothing archived for this id/url")
    )
)]
pub async fn retrieve_archive(
    State(state): State<AppState>,
    Json(payload): Json<ArchiveRetrieveRequest>,
) -> Result<Response> {
    match state.archiver.retrieve(payload).await? {
        RetrievedArtifact::File {
            path,
            media_type,
            filename,
        } => {
            let bytes = tokio::fs::read(&path).await?;
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, media_type.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                bytes,
            )
                .into_response())
        }
        RetrievedArtifact::Bundle { bytes, filename } => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/gzip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            bytes,
        )
            .into_response()),
    }
}

/// GET /archive/:archived_url_id/size - Size statistics for one archived URL
#[utoipa::path(
    get,
    path = "/archive/{archived_url_id}/size",
    tag = "archive",
    params(
        ("archived_url_id" = i64, Path, description = "Archived URL id")
    ),
    responses(
        (status = 200, description = "Aggregate and per-artifact sizes", body = crate::types::SizeStatsResponse),
        (status = 404, description = "Archived URL not found")
    )
)]
pub async fn archive_size(
    State(state): State<AppState>,
    Path(archived_url_id): Path<i64>,
) -> Result<Response> {
    let stats = state.archiver.size_stats(archived_url_id).await?;
    Ok((StatusCode::OK, Json(stats)).into_response())
}
