//! # pagevault
//!
//! Highly configurable backend library for on-demand web page archival.
//!
//! ## Design Philosophy
//!
//! pagevault is designed to be:
//! - **Highly configurable** - Archivers, storage fan-out, dedup, and cleanup
//!   are all driven by explicit configuration
//! - **Sensible defaults** - Works out of the box with a local data directory
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Catalog-backed** - Every archiver run, subprocess line, and upload
//!   outcome is recorded in SQLite for replay and auditing
//!
//! ## Quick Start
//!
//! ```no_run
//! use pagevault::{PageArchiver, Config};
//! use pagevault::types::SaveRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         ..Default::default()
//!     };
//!
//!     let archiver = PageArchiver::new(config).await?;
//!
//!     // Synchronous single-archiver run
//!     let response = archiver
//!         .archive_now(
//!             "monolith",
//!             SaveRequest {
//!                 id: "article-1".to_string(),
//!                 url: "https://example.org/story".to_string(),
//!                 name: None,
//!             },
//!         )
//!         .await?;
//!     println!("archived: {:?}", response.saved_path);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Archiver strategies and the archive-with-storage pipeline
pub mod archivers;
/// Deferred local cleanup scheduler
pub mod cleanup;
/// Serialized subprocess execution with catalog capture and replay
pub mod command_runner;
/// Configuration types
pub mod config;
/// Database persistence layer (the archival catalog)
pub mod db;
/// Database storage providers (relational / document / dual)
pub mod dbstore;
/// Error types
pub mod error;
/// Archival orchestration kernel
pub mod orchestrator;
/// Retry logic with exponential backoff
pub mod retry;
/// File storage providers (local / gcs)
pub mod storage;
/// Summarization notification
pub mod summarization;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use archivers::{Archiver, ArchiverRegistry};
pub use command_runner::{CommandRequest, CommandResult, CommandRunner};
pub use config::{Config, DualWriteFailureMode, ServiceRole, StorageProviderKind};
pub use db::Database;
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, Result, StorageError, ToHttpStatus};
pub use orchestrator::{PageArchiver, RetrievedArtifact};
pub use storage::{FileStorageProvider, GcsFileStorage, LocalFileStorage};
pub use summarization::SummarizationNotifier;
pub use types::{ArchiveResult, ArchiveStatus, Event, PageMetadata, StorageUploadRecord};

/// Helper function to run the archiver with graceful signal handling.
///
/// Waits for a termination signal and then calls the archiver's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use pagevault::{PageArchiver, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let archiver = PageArchiver::new(config).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(archiver).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(archiver: PageArchiver) -> Result<()> {
    wait_for_signal().await;
    archiver.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal handlers may fail to register in restricted environments
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
