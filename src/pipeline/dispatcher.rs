//! Dispatcher: one spawned Task Unit per input item.
//!
//! Every count a unit is tracked by (the run tracker and the pipeline-wide
//! in-flight tracker) is incremented while the unit is built, before
//! `tokio::spawn` hands it to the scheduler. A unit therefore can never
//! decrement a count it was not yet added to.

use futures::{Stream, StreamExt};

use crate::tracker::ActiveTracker;
use crate::types::WorkItem;

use super::task_unit::Delivery;
use super::{Pipeline, RunContext};

impl Pipeline {
    /// Spawn a unit for every item of a finite collection. Returns the count.
    ///
    /// Units are numbered from zero in input order; the number is the slot a
    /// unit reports under.
    pub(crate) fn dispatch<T, I>(
        &self,
        run: &RunContext,
        items: I,
        delivery: &Delivery<T>,
        tracker: Option<&ActiveTracker>,
    ) -> usize
    where
        T: Send + 'static,
        I: IntoIterator<Item = WorkItem>,
    {
        let mut spawned = 0;
        for item in items {
            self.spawn_unit(run, spawned, item, delivery, tracker);
            spawned += 1;
        }
        tracing::debug!(run = run.id.0, spawned, "Dispatched all items");
        spawned
    }

    /// Spawn a unit for every item a live stream yields, until the producer
    /// closes it. Returns the count.
    pub(crate) async fn dispatch_stream<T, S>(
        &self,
        run: &RunContext,
        items: S,
        delivery: &Delivery<T>,
        tracker: &ActiveTracker,
    ) -> usize
    where
        T: Send + 'static,
        S: Stream<Item = WorkItem>,
    {
        let mut items = std::pin::pin!(items);
        let mut spawned = 0;
        while let Some(item) = items.next().await {
            self.spawn_unit(run, spawned, item, delivery, Some(tracker));
            spawned += 1;
        }
        tracing::debug!(run = run.id.0, spawned, "Input stream closed");
        spawned
    }

    fn spawn_unit<T>(
        &self,
        run: &RunContext,
        slot: usize,
        item: WorkItem,
        delivery: &Delivery<T>,
        tracker: Option<&ActiveTracker>,
    ) where
        T: Send + 'static,
    {
        let run_guard = tracker.map(ActiveTracker::guard);
        let unit = self.task_unit(run, slot, item, delivery.clone(), run_guard);
        self.stats.record_spawned();
        tokio::spawn(unit.run());
    }
}
