//! HTTP error response handling for the API
//!
//! Routes return `Result<Response>` and let this conversion produce the
//! JSON error envelope. Two behaviors live here rather than in handlers:
//! server-side failures are logged once at the edge (handlers stay free of
//! error-logging boilerplate), and backpressure rejections carry a
//! `Retry-After` hint so batch clients pace their resubmissions instead of
//! hammering a full queue.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// Retry hint attached to queue-full and shutdown rejections
const BACKPRESSURE_RETRY_AFTER_SECS: &str = "30";

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Client errors (bad ids, unknown archivers, missing tasks) are
        // normal traffic; only server-side failures are worth a log line
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "Request failed");
        }

        // Transient capacity rejections: the queue drains and shutdown is a
        // redeploy, so tell the client when a resubmission is worth trying
        let backpressure = matches!(self, Error::QueueFull { .. } | Error::ShuttingDown);

        let body = Json(ApiError::from(self));
        if backpressure {
            (
                status,
                [(header::RETRY_AFTER, BACKPRESSURE_RETRY_AFTER_SECS)],
                body,
            )
                .into_response()
        } else {
            (status, body).into_response()
        }
    }
}
