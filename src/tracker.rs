//! Completion tracking for in-flight tasks
//!
//! [`ActiveTracker`] is an async wait group: an atomic count of outstanding
//! tasks plus a [`Notify`] that releases every waiter once the count returns
//! to zero. Tasks normally hold a [`TaskGuard`] so the decrement happens on
//! every exit path, including a panic unwinding through the task.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Shared counter of outstanding tasks
///
/// Cloning is cheap; clones observe and mutate the same count.
#[derive(Clone, Debug, Default)]
pub struct ActiveTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    active: AtomicUsize,
    zero: Notify,
}

impl ActiveTracker {
    /// Create a tracker with nothing outstanding
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `n` more outstanding tasks
    ///
    /// Must be called before the tasks it accounts for are started.
    pub fn add(&self, n: usize) {
        self.inner.active.fetch_add(n, Ordering::AcqRel);
    }

    /// Mark one outstanding task as terminated
    ///
    /// A call with nothing outstanding is logged and ignored; the count never
    /// goes below zero.
    pub fn done(&self) {
        match self
            .inner
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(1) => {
                tracing::trace!("active task count reached zero");
                self.inner.zero.notify_waiters();
            }
            Ok(_) => {}
            Err(_) => {
                tracing::error!("done() called with no outstanding tasks, ignoring");
            }
        }
    }

    /// Register one outstanding task and return the guard that releases it
    pub fn guard(&self) -> TaskGuard {
        self.add(1);
        TaskGuard {
            tracker: self.clone(),
        }
    }

    /// Current number of outstanding tasks
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Wait until no task is outstanding
    ///
    /// Returns immediately when the count is already zero. Any number of
    /// callers may wait at once, and dropping the future is harmless.
    pub async fn wait(&self) {
        loop {
            // Register before checking so a concurrent final done() cannot slip
            // between the check and the await.
            let notified = self.inner.zero.notified();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Releases one outstanding task of an [`ActiveTracker`] when dropped
#[derive(Debug)]
#[must_use = "dropping the guard immediately marks the task as done"]
pub struct TaskGuard {
    tracker: ActiveTracker,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.tracker.done();
    }
}
