//! Draining and shutdown coordination.

use std::sync::atomic::Ordering;

use crate::types::Event;

use super::Pipeline;

impl Pipeline {
    /// Wait until every unit spawned by any run has terminated
    ///
    /// Units spawned while waiting are waited for too.
    pub async fn drain(&self) {
        self.in_flight.wait().await;
    }

    /// Gracefully shut down the pipeline
    ///
    /// 1. Stops accepting new runs
    /// 2. Cancels every run; units that have not invoked the worker skip it
    /// 3. Waits for in-flight units, up to `shutdown_timeout`
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Aggregators of runs still in progress return once their units are done.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new runs");

        self.cancel_token.cancel();
        tracing::info!(in_flight = self.in_flight(), "Signaled cancellation to all runs");

        let timeout = self.config.shutdown_timeout;
        match tokio::time::timeout(timeout, self.drain()).await {
            Ok(()) => {
                tracing::info!("All in-flight units terminated");
            }
            Err(_) => {
                tracing::warn!(
                    in_flight = self.in_flight(),
                    "Timeout waiting for in-flight units, proceeding with shutdown"
                );
            }
        }

        self.event_tx.send(Event::Shutdown).ok();
        tracing::info!("Graceful shutdown complete");
    }
}
