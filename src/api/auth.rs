//! Authentication middleware for the REST API
//!
//! When an API key is configured, every route except the liveness probes
//! requires it. The probes stay open: the orchestrator must be
//! health-checkable from outside the trust boundary (load balancers and
//! uptime monitors do not carry credentials).
//!
//! The key is accepted from an `X-Api-Key` header or an
//! `Authorization: Bearer` header, so both archival batch jobs and
//! bearer-token HTTP clients can authenticate without custom plumbing.

use crate::error::ApiError;
use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Routes reachable without a key
const EXEMPT_PATHS: &[&str] = &["/health", "/healthz"];

/// Middleware enforcing the configured API key on non-probe routes
pub async fn require_api_key(
    State(expected_api_key): State<Option<String>>,
    request: Request,
    next: Next,
) -> Response {
    // No key configured: the deployment chose an open API
    let Some(expected_key) = expected_api_key else {
        return next.run(request).await;
    };

    if EXEMPT_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    // The extracted key borrows the request, so settle the verdict before
    // handing the request onward
    let verdict = match provided_key(&request) {
        Some(key) if keys_match(key.as_bytes(), expected_key.as_bytes()) => Ok(()),
        Some(_) => Err("Invalid API key"),
        None => Err("Missing API key (X-Api-Key or Authorization: Bearer)"),
    };

    match verdict {
        Ok(()) => next.run(request).await,
        Err(message) => reject(message),
    }
}

/// Extract the client's key from `X-Api-Key`, falling back to a bearer token
fn provided_key(request: &Request) -> Option<&str> {
    if let Some(value) = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
    {
        return Some(value);
    }

    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Timing-safe key comparison
///
/// The length difference and every byte difference fold into one
/// accumulator, so the comparison takes the same time wherever (and
/// whether) the keys diverge.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let mut mismatch = provided.len() ^ expected.len();
    for (p, e) in provided.iter().zip(expected.iter()) {
        mismatch |= usize::from(p ^ e);
    }
    mismatch == 0
}

/// 401 with the crate's standard error envelope
fn reject(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError::unauthorized(message)),
    )
        .into_response()
}
