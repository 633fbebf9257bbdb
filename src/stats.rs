//! Cumulative pipeline counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by every Task Unit of a pipeline
#[derive(Debug, Default)]
pub(crate) struct PipelineStats {
    spawned: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    orphaned: AtomicU64,
    total_bytes: AtomicU64,
}

impl PipelineStats {
    pub(crate) fn record_spawned(&self) {
        self.spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self, bytes: Option<u64>) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        if let Some(bytes) = bytes {
            // Saturate rather than wrap on absurd sizes.
            self.total_bytes
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |total| {
                    Some(total.saturating_add(bytes))
                })
                .ok();
        }
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_orphaned(&self) {
        self.orphaned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            spawned: self.spawned.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            orphaned: self.orphaned.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the pipeline counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Task Units spawned by concurrent variants
    pub spawned: u64,
    /// Worker calls that produced an artifact
    pub succeeded: u64,
    /// Worker calls that failed (including timeouts and failed size queries)
    pub failed: u64,
    /// Units that skipped the worker because their run was cancelled
    pub cancelled: u64,
    /// Results that could not be delivered because nobody was reading any more
    pub orphaned: u64,
    /// Sum of measured artifact sizes
    pub total_bytes: u64,
}

impl StatsSnapshot {
    /// Units that reached a terminal state
    pub fn finished(&self) -> u64 {
        self.succeeded + self.failed + self.cancelled
    }
}
