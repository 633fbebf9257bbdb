//! Result conduit: the queue carrying unit results to the aggregator.
//!
//! A conduit closes when its last sender is dropped. Units hold clones; the
//! closer holds the original and drops it only after the run's tracker has
//! reached zero, so closing happens after every unit's final decrement and no
//! sender is left that could write afterwards.

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::tracker::ActiveTracker;
use crate::types::{Event, RunId};

/// Sending half held by Task Units and the closer
pub(crate) enum ConduitSender<T> {
    Bounded(mpsc::Sender<T>),
    Unbounded(mpsc::UnboundedSender<T>),
}

impl<T> Clone for ConduitSender<T> {
    fn clone(&self) -> Self {
        match self {
            ConduitSender::Bounded(tx) => ConduitSender::Bounded(tx.clone()),
            ConduitSender::Unbounded(tx) => ConduitSender::Unbounded(tx.clone()),
        }
    }
}

impl<T> ConduitSender<T> {
    /// Deliver one result; `false` when the receiving side is gone
    pub(crate) async fn send(&self, value: T) -> bool {
        match self {
            ConduitSender::Bounded(tx) => tx.send(value).await.is_ok(),
            ConduitSender::Unbounded(tx) => tx.send(value).is_ok(),
        }
    }
}

/// Receiving half owned by the aggregator
pub(crate) enum ConduitReceiver<T> {
    Bounded(mpsc::Receiver<T>),
    Unbounded(mpsc::UnboundedReceiver<T>),
}

impl<T> ConduitReceiver<T> {
    /// Next result, or `None` once the conduit is closed and drained
    pub(crate) async fn recv(&mut self) -> Option<T> {
        match self {
            ConduitReceiver::Bounded(rx) => rx.recv().await,
            ConduitReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// Fixed-capacity conduit; a capacity of zero is raised to one
pub(crate) fn bounded<T>(capacity: usize) -> (ConduitSender<T>, ConduitReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ConduitSender::Bounded(tx), ConduitReceiver::Bounded(rx))
}

/// Conduit that never makes a sender wait
pub(crate) fn unbounded<T>() -> (ConduitSender<T>, ConduitReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ConduitSender::Unbounded(tx), ConduitReceiver::Unbounded(rx))
}

/// Spawn the closer: wait for the run's units, then release the last sender.
///
/// Must run concurrently with the aggregator's drain loop, since that loop
/// only ends once this task has dropped `sender`.
pub(crate) fn spawn_closer<T>(
    run: RunId,
    tracker: ActiveTracker,
    sender: ConduitSender<T>,
    event_tx: broadcast::Sender<Event>,
) -> JoinHandle<()>
where
    T: Send + 'static,
{
    tokio::spawn(async move {
        tracker.wait().await;
        drop(sender);
        tracing::debug!(run = run.0, "Result conduit closed");
        event_tx.send(Event::ConduitClosed { run }).ok();
    })
}
