//! Common test utilities for fanout-pipeline integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fanout_pipeline::{Artifact, ArtifactWorker, WorkItem, WorkerError};
use rand::Rng;

/// Worker with random short latency and deterministic failures
///
/// Items are named `item-{index}`; every item whose index is a multiple of
/// `fail_every` fails (0 disables failures). Artifact sizes are `index + 1`,
/// so totals are easy to predict.
pub struct StressWorker {
    fail_every: usize,
    calls: AtomicUsize,
}

impl StressWorker {
    pub fn new(fail_every: usize) -> Self {
        Self {
            fail_every,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fails(&self, index: usize) -> bool {
        self.fail_every != 0 && index % self.fail_every == 0
    }

    /// Expected number of failures among the first `n` items
    pub fn expected_failures(&self, n: usize) -> usize {
        (0..n).filter(|&i| self.fails(i)).count()
    }

    /// Expected byte total over the first `n` items
    pub fn expected_total(&self, n: usize) -> u64 {
        (0..n)
            .filter(|&i| !self.fails(i))
            .map(|i| i as u64 + 1)
            .sum()
    }
}

fn index_of(item: &WorkItem) -> usize {
    item.as_str()
        .strip_prefix("item-")
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[async_trait::async_trait]
impl ArtifactWorker for StressWorker {
    async fn process(&self, item: &WorkItem) -> Result<Artifact, WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let micros = rand::thread_rng().gen_range(0..=2000);
        tokio::time::sleep(Duration::from_micros(micros)).await;

        if self.fails(index_of(item)) {
            return Err(WorkerError::new(item.clone(), "image: unknown format"));
        }
        Ok(Artifact::new(item.clone(), format!("{}.thumb", item.as_str())))
    }

    async fn size(&self, artifact: &Artifact) -> Result<u64, WorkerError> {
        Ok(index_of(&artifact.source) as u64 + 1)
    }
}

pub fn items(n: usize) -> Vec<WorkItem> {
    (0..n).map(|i| WorkItem::new(format!("item-{i}"))).collect()
}
