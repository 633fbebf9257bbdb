//! Fan-out/fan-in pipeline (decomposed into focused submodules)
//!
//! - [`conduit`] - Result conduit halves and the closer task
//! - [`task_unit`] - One unit of work around a single worker call
//! - [`dispatcher`] - Spawning units from collections and streams
//! - [`sequential`], [`fan_out`], [`buffered`], [`tracked`] - Aggregation variants
//! - [`lifecycle`] - Draining and shutdown

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::tracker::ActiveTracker;
use crate::types::{Event, RunId, Variant};
use crate::worker::ArtifactWorker;

mod buffered;
mod conduit;
mod dispatcher;
mod fan_out;
mod lifecycle;
mod sequential;
mod task_unit;
mod tracked;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod test_helpers;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use buffered::BatchOutcome;

/// Concurrent task pipeline around a single [`ArtifactWorker`]
///
/// Each entry point is one processing strategy (see [`Variant`]). All of them
/// share the worker, configuration, event channel, statistics and the
/// pipeline-wide in-flight count. Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    worker: Arc<dyn ArtifactWorker>,
    event_tx: broadcast::Sender<Event>,
    stats: Arc<PipelineStats>,
    /// Every unit spawned by any run, until it terminates
    in_flight: ActiveTracker,
    limiter: Option<Arc<Semaphore>>,
    cancel_token: CancellationToken,
    accepting_new: Arc<AtomicBool>,
    next_run: Arc<AtomicU64>,
}

/// Per-run state handed to the dispatcher and units
#[derive(Clone, Debug)]
pub(crate) struct RunContext {
    pub(crate) id: RunId,
    pub(crate) variant: Variant,
    /// Child of the pipeline token; cancelling it only affects this run
    pub(crate) cancel_token: CancellationToken,
}

impl Pipeline {
    /// Create a pipeline after validating `config`
    pub fn new(config: PipelineConfig, worker: Arc<dyn ArtifactWorker>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(config.event_capacity);
        let limiter = config
            .max_concurrency
            .map(|permits| Arc::new(Semaphore::new(permits)));

        Ok(Self {
            config: Arc::new(config),
            worker,
            event_tx,
            stats: Arc::new(PipelineStats::default()),
            in_flight: ActiveTracker::new(),
            limiter,
            cancel_token: CancellationToken::new(),
            accepting_new: Arc::new(AtomicBool::new(true)),
            next_run: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Create a pipeline from an owned worker
    pub fn with_worker<W>(config: PipelineConfig, worker: W) -> Result<Self>
    where
        W: ArtifactWorker + 'static,
    {
        Self::new(config, Arc::new(worker))
    }

    /// Active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Subscribe to pipeline events
    ///
    /// Events sent before subscribing are not replayed. A subscriber that falls
    /// more than `event_capacity` events behind receives `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the cumulative counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Units from any run that have not terminated yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.active()
    }

    /// Whether new runs are accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Register a new run, rejecting it once shutdown has begun
    pub(crate) fn begin_run(&self, variant: Variant) -> Result<RunContext> {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }

        let id = RunId(self.next_run.fetch_add(1, Ordering::Relaxed) + 1);
        tracing::info!(run = id.0, variant = %variant, "Starting pipeline run");
        self.event_tx
            .send(Event::RunStarted { run: id, variant })
            .ok();

        Ok(RunContext {
            id,
            variant,
            cancel_token: self.cancel_token.child_token(),
        })
    }

    /// Log and announce that the aggregator is returning
    pub(crate) fn finish_run(&self, run: &RunContext, succeeded: usize, failed: usize) {
        tracing::info!(
            run = run.id.0,
            variant = %run.variant,
            succeeded,
            failed,
            "Pipeline run finished"
        );
        self.event_tx
            .send(Event::RunFinished {
                run: run.id,
                succeeded,
                failed,
            })
            .ok();
    }
}
