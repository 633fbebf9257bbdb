//! Plain fan-out variants without completion tracking.
//!
//! These exist for comparison with the tracked variants. Only
//! [`Pipeline::run_rendezvous`] tells the caller when the work is over, and
//! [`Pipeline::run_first_error_naive`] leaves units running after it returns.

use crate::error::Result;
use crate::types::{Variant, WorkItem};

use super::Pipeline;
use super::conduit;
use super::task_unit::Delivery;

impl Pipeline {
    /// Spawn a unit per item and return immediately.
    ///
    /// Failures are logged and otherwise dropped. Nothing tells the caller when
    /// the units are done; use [`Pipeline::drain`] or a tracked variant if that
    /// matters.
    pub fn run_fire_and_forget<I>(&self, items: I)
    where
        I: IntoIterator<Item = WorkItem>,
    {
        let run = match self.begin_run(Variant::FireAndForget) {
            Ok(run) => run,
            Err(e) => {
                tracing::warn!(error = %e, "Fire-and-forget run rejected");
                return;
            }
        };

        self.dispatch(&run, items, &Delivery::none(), None);
    }

    /// Spawn a unit per item and wait for one completion signal from each.
    ///
    /// Failures are logged and otherwise dropped; every unit signals presence
    /// whatever its outcome. Returns the number of signals received, which is
    /// the item count unless units were cancelled by shutdown.
    pub async fn run_rendezvous<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = WorkItem>,
    {
        let run = match self.begin_run(Variant::Rendezvous) {
            Ok(run) => run,
            Err(e) => {
                tracing::warn!(error = %e, "Rendezvous run rejected");
                return 0;
            }
        };

        let (tx, mut rx) = conduit::bounded::<()>(1);
        let delivery = Delivery::presence(tx);
        let total = self.dispatch(&run, items, &delivery, None);
        drop(delivery);

        let mut signals = 0;
        while signals < total {
            match rx.recv().await {
                Some(()) => signals += 1,
                // Every unit is gone; the missing ones were cancelled.
                None => break,
            }
        }

        self.finish_run(&run, signals, total - signals);
        signals
    }

    /// Return as soon as the first failure arrives.
    ///
    /// # Hazard: abandoned units
    ///
    /// This is the first-error-wins shape that leaks work. On an early return
    /// nothing cancels the units that have not reported yet; they keep running
    /// after the caller has moved on, and each still tries to deliver its
    /// result. With a conduit nobody reads but somebody still owns, those
    /// deliveries would wait forever. Here the receiver is dropped on return,
    /// so the late deliveries fail and are counted as
    /// [`StatsSnapshot::orphaned`](crate::StatsSnapshot::orphaned), and the
    /// units stay visible through [`Pipeline::in_flight`] until their worker
    /// calls finish.
    ///
    /// Prefer [`Pipeline::run_buffered`] (drain everything, then decide) or
    /// [`Pipeline::run_cancelling`] (fail fast and cancel the rest).
    pub async fn run_first_error_naive<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = WorkItem>,
    {
        let run = self.begin_run(Variant::FirstErrorNaive)?;

        let (tx, mut rx) = conduit::bounded(1);
        let delivery = Delivery::results(tx);
        let total = self.dispatch(&run, items, &delivery, None);
        drop(delivery);

        let mut succeeded = 0;
        for _ in 0..total {
            match rx.recv().await {
                Some(Ok(_)) => succeeded += 1,
                Some(Err(e)) => {
                    tracing::warn!(
                        run = run.id.0,
                        abandoned = total - succeeded - 1,
                        "First failure, returning without waiting for remaining units"
                    );
                    self.finish_run(&run, succeeded, 1);
                    return Err(e.into());
                }
                None => break,
            }
        }

        self.finish_run(&run, succeeded, 0);
        Ok(())
    }
}
