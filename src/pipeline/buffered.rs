//! Buffered collect: drain every result, then decide.

use crate::error::{Error, Result};
use crate::types::{Artifact, TaskResult, Variant, WorkItem, WorkerError};

use super::Pipeline;
use super::conduit;
use super::task_unit::Delivery;

/// Every outcome of a buffered run
///
/// `artifacts.len() + failures.len()` equals the number of input items.
/// Both lists are in arrival order, which is arbitrary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Produced artifacts
    pub artifacts: Vec<Artifact>,
    /// Items that failed
    pub failures: Vec<WorkerError>,
}

impl BatchOutcome {
    fn push(&mut self, result: TaskResult) {
        match result {
            Ok(artifact) => self.artifacts.push(artifact),
            Err(e) => self.failures.push(e),
        }
    }

    /// Total number of outcomes
    pub fn len(&self) -> usize {
        self.artifacts.len() + self.failures.len()
    }

    /// True when the run had no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first failure that arrived, if any
    pub fn first_error(&self) -> Option<&WorkerError> {
        self.failures.first()
    }

    /// Artifact names, as callers of the collect variants expect
    pub fn artifact_names(&self) -> Vec<String> {
        self.artifacts.iter().map(Artifact::name).collect()
    }

    /// All artifacts, or the first failure
    pub fn into_result(self) -> Result<Vec<Artifact>> {
        match self.failures.into_iter().next() {
            Some(e) => Err(Error::Worker(e)),
            None => Ok(self.artifacts),
        }
    }
}

impl Pipeline {
    /// Process all items concurrently and collect every outcome.
    ///
    /// The conduit has one slot per item, so no unit ever waits to deliver and
    /// none can be stranded. Outcomes are accounted by dispatch position, not
    /// by the identities the worker puts in its results. An item whose unit
    /// skipped the worker because the pipeline shut down is reported as a
    /// failure, keeping one outcome per item.
    pub async fn collect_buffered<I>(&self, items: I) -> Result<BatchOutcome>
    where
        I: IntoIterator<Item = WorkItem>,
    {
        let run = self.begin_run(Variant::Buffered)?;
        let items: Vec<WorkItem> = items.into_iter().collect();

        let (tx, mut rx) = conduit::bounded(items.len());
        let delivery = Delivery::slotted(tx);
        self.dispatch(&run, items.iter().cloned(), &delivery, None);
        drop(delivery);

        let mut reported = vec![false; items.len()];
        let mut outcome = BatchOutcome::default();
        while let Some((slot, result)) = rx.recv().await {
            if let Some(seen) = reported.get_mut(slot) {
                *seen = true;
            }
            outcome.push(result);
        }

        for (item, _) in items
            .into_iter()
            .zip(reported)
            .filter(|(_, seen)| !seen)
        {
            tracing::warn!(run = run.id.0, item = %item, "Task cancelled before processing");
            outcome.push(Err(WorkerError::new(item, "cancelled before processing")));
        }

        self.finish_run(&run, outcome.artifacts.len(), outcome.failures.len());
        Ok(outcome)
    }

    /// Process all items concurrently; return every artifact, or the first
    /// failure once all units have finished.
    pub async fn run_buffered<I>(&self, items: I) -> Result<Vec<Artifact>>
    where
        I: IntoIterator<Item = WorkItem>,
    {
        self.collect_buffered(items).await?.into_result()
    }
}
