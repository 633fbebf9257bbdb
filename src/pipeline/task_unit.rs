//! Task Unit: one worker call for one item, and its single report.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

use crate::stats::PipelineStats;
use crate::tracker::TaskGuard;
use crate::types::{Event, RunId, TaskResult, WorkItem, WorkerError};
use crate::worker::ArtifactWorker;

use super::conduit::ConduitSender;
use super::{Pipeline, RunContext};

/// What a unit learned from the worker
pub(crate) struct UnitReport {
    /// Dispatch position of the unit's item within its run
    pub(crate) slot: usize,
    pub(crate) result: TaskResult,
    /// Artifact size, present only when the run measures and the query succeeded
    pub(crate) bytes: Option<u64>,
}

/// Turns a report into the message a variant wants on its conduit
pub(crate) type Emitter<T> = fn(UnitReport) -> Option<T>;

/// Where a unit sends its report, and in what shape
pub(crate) struct Delivery<T> {
    tx: Option<ConduitSender<T>>,
    emit: Emitter<T>,
    measure: bool,
}

impl<T> Clone for Delivery<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            emit: self.emit,
            measure: self.measure,
        }
    }
}

impl Delivery<TaskResult> {
    /// Send every result, success or failure
    pub(crate) fn results(tx: ConduitSender<TaskResult>) -> Self {
        Self {
            tx: Some(tx),
            emit: |report| Some(report.result),
            measure: false,
        }
    }
}

/// A result tagged with the dispatch position of its item
pub(crate) type SlotResult = (usize, TaskResult);

impl Delivery<SlotResult> {
    /// Send every result together with its slot, so the aggregator can account
    /// for items without trusting identities the worker reports
    pub(crate) fn slotted(tx: ConduitSender<SlotResult>) -> Self {
        Self {
            tx: Some(tx),
            emit: |report| Some((report.slot, report.result)),
            measure: false,
        }
    }
}

impl Delivery<()> {
    /// Send a bare completion signal regardless of the outcome
    pub(crate) fn presence(tx: ConduitSender<()>) -> Self {
        Self {
            tx: Some(tx),
            emit: |_| Some(()),
            measure: false,
        }
    }

    /// Report nothing
    pub(crate) fn none() -> Self {
        Self {
            tx: None,
            emit: |_| None,
            measure: false,
        }
    }
}

impl Delivery<u64> {
    /// Measure successful artifacts and send their sizes; failures send nothing
    pub(crate) fn sizes(tx: ConduitSender<u64>) -> Self {
        Self {
            tx: Some(tx),
            emit: |report| report.bytes,
            measure: true,
        }
    }
}

/// One unit of work processing exactly one item
///
/// Field order matters: fields drop in declaration order, so the conduit
/// sender inside `delivery` is gone before either guard decrements its count.
/// The pipeline guard drops before the run guard, so a run whose tracker has
/// reached zero no longer contributes to [`Pipeline::in_flight`].
pub(crate) struct TaskUnit<T> {
    run: RunId,
    slot: usize,
    item: WorkItem,
    worker: Arc<dyn ArtifactWorker>,
    delivery: Delivery<T>,
    cancel_token: CancellationToken,
    limiter: Option<Arc<Semaphore>>,
    timeout: Option<Duration>,
    log_errors: bool,
    event_tx: broadcast::Sender<Event>,
    stats: Arc<PipelineStats>,
    _pipeline_guard: TaskGuard,
    _run_guard: Option<TaskGuard>,
}

impl Pipeline {
    /// Build a unit for `item`, the `slot`-th item of the run. Counts it as in
    /// flight immediately.
    pub(crate) fn task_unit<T>(
        &self,
        run: &RunContext,
        slot: usize,
        item: WorkItem,
        delivery: Delivery<T>,
        run_guard: Option<TaskGuard>,
    ) -> TaskUnit<T> {
        TaskUnit {
            run: run.id,
            slot,
            item,
            worker: Arc::clone(&self.worker),
            delivery,
            cancel_token: run.cancel_token.clone(),
            limiter: self.limiter.clone(),
            timeout: self.config.task_timeout,
            log_errors: self.config.log_worker_errors,
            event_tx: self.event_tx.clone(),
            stats: Arc::clone(&self.stats),
            _pipeline_guard: self.in_flight.guard(),
            _run_guard: run_guard,
        }
    }
}

impl<T> TaskUnit<T>
where
    T: Send + 'static,
{
    /// Execute and deliver. Consumes the unit; its guards release on return.
    pub(crate) async fn run(self) {
        let Some(report) = self.execute().await else {
            return;
        };
        let Some(message) = (self.delivery.emit)(report) else {
            return;
        };
        if let Some(tx) = &self.delivery.tx
            && !tx.send(message).await
        {
            self.stats.record_orphaned();
            tracing::debug!(
                run = self.run.0,
                item = %self.item,
                "Result conduit has no reader, dropping result"
            );
        }
    }

    /// Invoke the worker once, unless the run was cancelled first.
    ///
    /// Returns `None` for a cancelled unit.
    pub(crate) async fn execute(&self) -> Option<UnitReport> {
        if self.cancel_token.is_cancelled() {
            self.record_cancelled();
            return None;
        }

        let _permit = match &self.limiter {
            Some(limiter) => tokio::select! {
                permit = limiter.acquire() => permit.ok(),
                () = self.cancel_token.cancelled() => {
                    self.record_cancelled();
                    return None;
                }
            },
            None => None,
        };
        if self.cancel_token.is_cancelled() {
            self.record_cancelled();
            return None;
        }

        tracing::debug!(run = self.run.0, item = %self.item, "Task started");
        self.event_tx
            .send(Event::TaskStarted {
                run: self.run,
                item: self.item.clone(),
            })
            .ok();

        let mut result = self.invoke().await;
        let mut bytes = None;
        if self.delivery.measure
            && let Ok(artifact) = &result
        {
            match self.catch_panic(self.worker.size(artifact)).await {
                Ok(size) => bytes = Some(size),
                Err(e) => result = Err(e),
            }
        }

        self.record(&result, bytes);
        Some(UnitReport {
            slot: self.slot,
            result,
            bytes,
        })
    }

    async fn invoke(&self) -> TaskResult {
        let call = self.catch_panic(self.worker.process(&self.item));
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(WorkerError::new(
                    self.item.clone(),
                    format!("worker timed out after {}ms", limit.as_millis()),
                )),
            },
            None => call.await,
        }
    }

    /// Turn a panic inside a worker call into a failure of this unit's item
    async fn catch_panic<V>(
        &self,
        call: impl Future<Output = std::result::Result<V, WorkerError>>,
    ) -> std::result::Result<V, WorkerError> {
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(&*payload);
                tracing::error!(run = self.run.0, item = %self.item, panic = %message, "Worker panicked");
                Err(WorkerError::new(
                    self.item.clone(),
                    format!("worker panicked: {message}"),
                ))
            }
        }
    }

    fn record(&self, result: &TaskResult, bytes: Option<u64>) {
        match result {
            Ok(artifact) => {
                self.stats.record_success(bytes);
                tracing::debug!(
                    run = self.run.0,
                    item = %self.item,
                    artifact = %artifact.path.display(),
                    bytes = ?bytes,
                    "Task completed"
                );
                self.event_tx
                    .send(Event::TaskCompleted {
                        run: self.run,
                        item: self.item.clone(),
                        bytes,
                    })
                    .ok();
            }
            Err(e) => {
                self.stats.record_failure();
                if self.log_errors {
                    tracing::warn!(run = self.run.0, item = %self.item, error = %e.reason, "Task failed");
                } else {
                    tracing::debug!(run = self.run.0, item = %self.item, error = %e.reason, "Task failed");
                }
                self.event_tx
                    .send(Event::TaskFailed {
                        run: self.run,
                        item: self.item.clone(),
                        error: e.reason.clone(),
                    })
                    .ok();
            }
        }
    }

    fn record_cancelled(&self) {
        self.stats.record_cancelled();
        tracing::debug!(run = self.run.0, item = %self.item, "Task cancelled before start");
        self.event_tx
            .send(Event::TaskCancelled {
                run: self.run,
                item: self.item.clone(),
            })
            .ok();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
