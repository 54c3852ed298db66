//! Task status handlers.

use crate::api::AppState;
use crate::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /tasks/:task_id - Aggregate status across a task's rows
#[utoipa::path(
    get,
    path = "/tasks/{task_id}",
    tag = "tasks",
    params(
        ("task_id" = String, Path, description = "Task identifier returned by a 202 response")
    ),
    responses(
        (status = 200, description = "Task status with per-item detail", body = crate::types::TaskStatusResponse),
        (status = 404, description = "Task not found")
    )
)]
pub async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response> {
    let status = state.archiver.task_status(&task_id).await?;
    Ok((StatusCode::OK, Json(status)).into_response())
}
