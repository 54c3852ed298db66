//! Admin surface handlers.

use super::{DeleteByUrlQuery, DeleteQuery, ListQuery};
use crate::api::AppState;
use crate::types::SummarizeRequest;
use crate::Result;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /admin/saves - Paginated artifact listing with file probes
#[utoipa::path(
    get,
    path = "/admin/saves",
    tag = "admin",
    params(ListQuery),
    responses(
        (status = 200, description = "Artifact rows", body = Vec<crate::types::AdminSaveRow>)
    )
)]
pub async fn list_saves(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response> {
    let rows = state
        .archiver
        .list_saves_admin(query.limit, query.offset)
        .await?;
    Ok((StatusCode::OK, Json(rows)).into_response())
}

/// GET /admin/archivers - Registered archiver names
#[utoipa::path(
    get,
    path = "/admin/archivers",
    tag = "admin",
    responses(
        (status = 200, description = "Archiver names in registration order", body = Vec<String>)
    )
)]
pub async fn list_archivers(State(state): State<AppState>) -> Response {
    let mut names: Vec<&'static str> = state.archiver.archiver_names();
    names.sort_unstable();
    (StatusCode::OK, Json(names)).into_response()
}

/// DELETE /admin/saves/:rowid - Delete one artifact row
#[utoipa::path(
    delete,
    path = "/admin/saves/{rowid}",
    tag = "admin",
    params(
        ("rowid" = i64, Path, description = "Artifact row id"),
        DeleteQuery
    ),
    responses(
        (status = 200, description = "Deletion summary", body = crate::types::DeleteResponse),
        (status = 404, description = "Row not found")
    )
)]
pub async fn delete_save(
    State(state): State<AppState>,
    Path(rowid): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> Result<Response> {
    let response = state.archiver.delete_save(rowid, query.remove_files).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// DELETE /admin/saves/by-item/:item_id - Delete every row of one item
#[utoipa::path(
    delete,
    path = "/admin/saves/by-item/{item_id}",
    tag = "admin",
    params(
        ("item_id" = String, Path, description = "Item identifier"),
        DeleteQuery
    ),
    responses(
        (status = 200, description = "Deletion summary", body = crate::types::DeleteResponse),
        (status = 404, description = "No rows for this item")
    )
)]
pub async fn delete_saves_by_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Response> {
    let response = state
        .archiver
        .delete_saves_by_item(&item_id, query.remove_files)
        .await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// DELETE /admin/saves/by-url - Delete every row of one URL
#[utoipa::path(
    delete,
    path = "/admin/saves/by-url",
    tag = "admin",
    params(DeleteByUrlQuery),
    responses(
        (status = 200, description = "Deletion summary", body = crate::types::DeleteResponse),
        (status = 404, description = "No rows for this URL")
    )
)]
pub async fn delete_saves_by_url(
    State(state): State<AppState>,
    Query(query): Query<DeleteByUrlQuery>,
) -> Result<Response> {
    let response = state
        .archiver
        .delete_saves_by_url(&query.url, query.remove_files)
        .await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// POST /admin/saves/:rowid/requeue - Reset an artifact to pending and re-run it
#[utoipa::path(
    post,
    path = "/admin/saves/{rowid}/requeue",
    tag = "admin",
    params(
        ("rowid" = i64, Path, description = "Artifact row id")
    ),
    responses(
        (status = 202, description = "Requeued", body = crate::types::TaskAccepted),
        (status = 404, description = "Row not found"),
        (status = 503, description = "Queue full or shutting down")
    )
)]
pub async fn requeue_save(
    State(state): State<AppState>,
    Path(rowid): Path<i64>,
) -> Result<Response> {
    let accepted = state.archiver.requeue_save(rowid).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
}

/// POST /admin/summarize - Re-notify summarization for a known artifact
#[utoipa::path(
    post,
    path = "/admin/summarize",
    tag = "admin",
    request_body = SummarizeRequest,
    responses(
        (status = 200, description = "Notification scheduled", body = crate::types::SummarizeResponse),
        (status = 404, description = "No matching artifact"),
        (status = 503, description = "Summarizer unavailable")
    )
)]
pub async fn summarize_article(
    State(state): State<AppState>,
    Json(payload): Json<SummarizeRequest>,
) -> Result<Response> {
    let response = state.archiver.summarize(payload).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}
