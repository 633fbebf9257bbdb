//! Tracked variants: completion tracker plus closer around the drain loop.
//!
//! The aggregator's loop ends when the conduit closes, and the conduit closes
//! when the closer sees the run tracker reach zero. The closer is a separate
//! task running alongside the drain loop; neither can be ordered before the
//! other.

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{Error, Result};
use crate::tracker::ActiveTracker;
use crate::types::{Artifact, Variant, WorkItem};

use super::Pipeline;
use super::conduit;
use super::task_unit::Delivery;

impl Pipeline {
    /// Channel for feeding [`Pipeline::run_tracked_channel`], sized by
    /// `stream_buffer`. Dropping every sender ends the input.
    pub fn item_channel(&self) -> (mpsc::Sender<WorkItem>, mpsc::Receiver<WorkItem>) {
        mpsc::channel(self.config.stream_buffer)
    }

    /// Process items from a live stream; return the total size in bytes of the
    /// artifacts produced.
    ///
    /// The number of items is not known up front: dispatch continues until the
    /// producer ends the stream, while results are summed as they arrive.
    /// Failed items (worker or size query) are logged and excluded from the
    /// total.
    pub async fn run_tracked<S>(&self, items: S) -> u64
    where
        S: Stream<Item = WorkItem> + Send + 'static,
    {
        let run = match self.begin_run(Variant::Tracked) {
            Ok(run) => run,
            Err(e) => {
                tracing::warn!(error = %e, "Tracked run rejected");
                return 0;
            }
        };

        let tracker = ActiveTracker::new();
        let (tx, mut rx) = conduit::unbounded::<u64>();

        // The spawn loop holds a guard of its own until the stream ends, so the
        // count cannot touch zero between two spawns.
        let dispatch_guard = tracker.guard();
        let dispatcher = {
            let pipeline = self.clone();
            let run = run.clone();
            let tracker = tracker.clone();
            let delivery = Delivery::sizes(tx.clone());
            tokio::spawn(async move {
                let spawned = pipeline
                    .dispatch_stream(&run, items, &delivery, &tracker)
                    .await;
                drop(delivery);
                drop(dispatch_guard);
                spawned
            })
        };
        let closer = conduit::spawn_closer(run.id, tracker, tx, self.event_tx.clone());

        let mut total: u64 = 0;
        let mut succeeded = 0;
        while let Some(bytes) = rx.recv().await {
            total = total.saturating_add(bytes);
            succeeded += 1;
        }

        let spawned = match dispatcher.await {
            Ok(spawned) => spawned,
            Err(e) => {
                tracing::error!(run = run.id.0, error = %e, "Dispatcher task failed");
                succeeded
            }
        };
        if let Err(e) = closer.await {
            tracing::error!(run = run.id.0, error = %e, "Closer task failed");
        }

        self.finish_run(&run, succeeded, spawned.saturating_sub(succeeded));
        total
    }

    /// [`Pipeline::run_tracked`] over the receiving half of an item channel
    pub async fn run_tracked_channel(&self, items: mpsc::Receiver<WorkItem>) -> u64 {
        self.run_tracked(ReceiverStream::new(items)).await
    }

    /// Process all items concurrently, failing fast on the first error.
    ///
    /// The first failure cancels the run: units that have not invoked the
    /// worker yet skip it. Units already inside the worker finish their call.
    /// The drain loop still runs until the closer closes the conduit, so every
    /// unit has terminated when this returns. Results arriving after the first
    /// failure are discarded.
    ///
    /// Returns [`Error::Cancelled`] if the pipeline was shut down during the
    /// run before any failure occurred.
    pub async fn run_cancelling<I>(&self, items: I) -> Result<Vec<Artifact>>
    where
        I: IntoIterator<Item = WorkItem>,
    {
        let run = self.begin_run(Variant::Cancelling)?;

        let tracker = ActiveTracker::new();
        let (tx, mut rx) = conduit::unbounded();
        let delivery = Delivery::results(tx.clone());
        let total = self.dispatch(&run, items, &delivery, Some(&tracker));
        drop(delivery);
        let closer = conduit::spawn_closer(run.id, tracker, tx, self.event_tx.clone());

        let mut artifacts = Vec::new();
        let mut first_error = None;
        let mut failed = 0;
        while let Some(result) = rx.recv().await {
            match result {
                Ok(artifact) if first_error.is_none() => artifacts.push(artifact),
                Ok(_) => {}
                Err(e) => {
                    failed += 1;
                    if first_error.is_none() {
                        tracing::info!(
                            run = run.id.0,
                            item = %e.item,
                            "First failure, cancelling remaining units"
                        );
                        run.cancel_token.cancel();
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Err(e) = closer.await {
            tracing::error!(run = run.id.0, error = %e, "Closer task failed");
        }
        self.finish_run(&run, artifacts.len(), failed);

        match first_error {
            Some(e) => Err(Error::Worker(e)),
            None if artifacts.len() < total => Err(Error::Cancelled),
            None => Ok(artifacts),
        }
    }
}
