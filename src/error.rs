//! Error types for pagevault
//!
//! This module provides comprehensive error handling for the library, including:
//! - Domain-specific error types (Database, Storage, Archiver, etc.)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//! - Context information (item id, provider, archiver, etc.)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for pagevault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pagevault
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "data_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Storage provider error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid input at the API edge (bad id, missing url, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// Archiver name not present in the registry
    #[error("unknown archiver: {0}")]
    UnknownArchiver(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new work")]
    ShuttingDown,

    /// Task queue is at capacity
    #[error("task queue is full (capacity {capacity})")]
    QueueFull {
        /// The configured queue capacity
        capacity: usize,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Replica write failed in strict dual-persistence mode
    #[error("replica write failed: {0}")]
    ReplicaWrite(String),

    /// Summarization collaborator unavailable
    #[error("summarizer unavailable")]
    SummarizerUnavailable,

    /// External tool execution failed (chromium, monolith, etc.)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Storage provider errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Upload to a provider failed
    #[error("upload to {provider} failed for {path}: {reason}")]
    UploadFailed {
        /// Provider name ("local", "gcs")
        provider: &'static str,
        /// Destination path within the provider
        path: String,
        /// The reason the upload failed
        reason: String,
    },

    /// Download from a provider failed
    #[error("download from {provider} failed for {path}: {reason}")]
    DownloadFailed {
        /// Provider name ("local", "gcs")
        provider: &'static str,
        /// Storage path within the provider
        path: String,
        /// The reason the download failed
        reason: String,
    },

    /// Object not found in storage
    #[error("object not found in {provider}: {path}")]
    ObjectNotFound {
        /// Provider name ("local", "gcs")
        provider: &'static str,
        /// Storage path that was not found
        path: String,
    },

    /// Delete failed
    #[error("delete from {provider} failed for {path}: {reason}")]
    DeleteFailed {
        /// Provider name ("local", "gcs")
        provider: &'static str,
        /// Storage path being deleted
        path: String,
        /// The reason the delete failed
        reason: String,
    },

    /// Invalid storage path (escapes the root, empty, ...)
    #[error("invalid storage path {path:?}: {reason}")]
    InvalidPath {
        /// The offending path
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },

    /// Provider client error (auth, misconfiguration)
    #[error("{provider} client error: {reason}")]
    Client {
        /// Provider name ("local", "gcs")
        provider: &'static str,
        /// The underlying error
        reason: String,
    },

    /// Access URL generation is not supported by this provider
    #[error("{0} does not support access URL generation")]
    AccessUrlUnsupported(&'static str),
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
/// It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "unknown_archiver",
///     "message": "unknown archiver: webp",
///     "details": {
///       "archiver": "webp"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    ///
    /// Clients can use this for programmatic error handling.
    pub code: String,

    /// Human-readable error message
    ///
    /// This is suitable for displaying to end users.
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }

    /// Create a "service unavailable" error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("service_unavailable", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::UnknownArchiver(_) => 404,
            Error::Database(DatabaseError::NotFound(_)) => 404,
            Error::Storage(StorageError::ObjectNotFound { .. }) => 404,

            // 409 Conflict
            Error::Database(DatabaseError::ConstraintViolation(_)) => 409,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::ReplicaWrite(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Network(_) => 502,
            Error::Storage(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::QueueFull { .. } => 503,
            Error::SummarizerUnavailable => 503,
            Error::ExternalTool(_) => 503,

            // 501 Not Implemented - Feature not supported
            Error::NotSupported(_) => 501,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Storage(e) => match e {
                StorageError::UploadFailed { .. } => "upload_failed",
                StorageError::DownloadFailed { .. } => "download_failed",
                StorageError::ObjectNotFound { .. } => "object_not_found",
                StorageError::DeleteFailed { .. } => "delete_failed",
                StorageError::InvalidPath { .. } => "invalid_storage_path",
                StorageError::Client { .. } => "storage_client_error",
                StorageError::AccessUrlUnsupported(_) => "access_url_unsupported",
            },
            Error::Validation(_) => "validation_error",
            Error::UnknownArchiver(_) => "unknown_archiver",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::QueueFull { .. } => "queue_full",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ReplicaWrite(_) => "replica_write_failed",
            Error::SummarizerUnavailable => "summarizer_unavailable",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::UnknownArchiver(name) => Some(serde_json::json!({
                "archiver": name,
            })),
            Error::QueueFull { capacity } => Some(serde_json::json!({
                "capacity": capacity,
            })),
            Error::Storage(StorageError::UploadFailed { provider, path, .. }) => {
                Some(serde_json::json!({
                    "provider": provider,
                    "path": path,
                }))
            }
            Error::Storage(StorageError::ObjectNotFound { provider, path }) => {
                Some(serde_json::json!({
                    "provider": provider,
                    "path": path,
                }))
            }
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
