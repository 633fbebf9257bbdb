//! Sequential baseline: no concurrency at all.

use crate::error::Result;
use crate::types::{TaskResult, Variant, WorkItem, WorkerError};

use super::Pipeline;
use super::task_unit::Delivery;

impl Pipeline {
    /// Process items one after another on the calling task.
    ///
    /// Failures are logged and processing continues. Returns one result per
    /// item, in input order. Items reached after the pipeline started shutting
    /// down are reported as cancelled failures.
    pub async fn run_sequential<I>(&self, items: I) -> Result<Vec<TaskResult>>
    where
        I: IntoIterator<Item = WorkItem>,
    {
        let run = self.begin_run(Variant::Sequential)?;
        let items = items.into_iter();
        let mut results = Vec::with_capacity(items.size_hint().0);
        let mut failed = 0;

        for (slot, item) in items.enumerate() {
            let unit = self.task_unit(&run, slot, item.clone(), Delivery::none(), None);
            let result = match unit.execute().await {
                Some(report) => report.result,
                None => Err(WorkerError::new(item, "cancelled before processing")),
            };
            if result.is_err() {
                failed += 1;
            }
            results.push(result);
        }

        self.finish_run(&run, results.len() - failed, failed);
        Ok(results)
    }
}
