//! Startup and shutdown coordination.

use super::PageArchiver;
use crate::Result;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// How long shutdown waits for in-flight work before giving up
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval while draining
const DRAIN_POLL: Duration = Duration::from_millis(100);

impl PageArchiver {
    /// Gracefully shut down: stop accepting work, drain, stop background loops
    ///
    /// New submissions are rejected immediately; queued and in-flight tasks
    /// get up to 30 seconds to finish (their pending rows survive either way
    /// and surface through the task status endpoint after a restart).
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutdown requested");
        self.queue_state.accepting_new.store(false, Ordering::SeqCst);

        let drained = tokio::time::timeout(DRAIN_TIMEOUT, self.wait_for_idle()).await;
        if drained.is_err() {
            tracing::warn!(
                "Shutdown drain timed out; pending rows remain for the next start"
            );
        }

        self.shutdown.cancel();
        self.db.close().await;
        tracing::info!("Shutdown complete");
        Ok(())
    }

    /// Wait until the queue is empty and no task is being processed
    pub(crate) async fn wait_for_idle(&self) {
        loop {
            let queue_empty = self.queue_state.queue.lock().await.is_empty();
            let active = self.queue_state.active_tasks.load(Ordering::SeqCst);
            if queue_empty && active == 0 {
                return;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }
}
