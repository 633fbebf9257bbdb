//! Shared test helpers for exercising pipelines with a scripted worker.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::types::{Artifact, WorkItem, WorkerError};
use crate::worker::ArtifactWorker;

use super::Pipeline;

/// Worker whose behavior per item is scripted up front
#[derive(Default)]
pub(crate) struct MockWorker {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    latency: HashMap<String, Duration>,
    default_latency: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
    invoked: Mutex<Vec<String>>,
}

impl MockWorker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on<'a>(mut self, items: impl IntoIterator<Item = &'a str>) -> Self {
        self.failing.extend(items.into_iter().map(str::to_string));
        self
    }

    pub(crate) fn panicking_on(mut self, item: &str) -> Self {
        self.panicking.insert(item.to_string());
        self
    }

    pub(crate) fn with_latency(mut self, item: &str, latency: Duration) -> Self {
        self.latency.insert(item.to_string(), latency);
        self
    }

    pub(crate) fn with_default_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous `process` calls observed
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn invoked(&self) -> Vec<String> {
        self.invoked.lock().unwrap().clone()
    }

    /// Size the worker reports for the artifact of `item`
    pub(crate) fn size_of(item: &str) -> u64 {
        thumb_name(item).len() as u64
    }
}

pub(crate) fn thumb_name(item: &str) -> String {
    match item.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}.thumb.{ext}"),
        None => format!("{item}.thumb"),
    }
}

#[async_trait::async_trait]
impl ArtifactWorker for MockWorker {
    async fn process(&self, item: &WorkItem) -> std::result::Result<Artifact, WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.invoked.lock().unwrap().push(item.0.clone());

        let latency = self
            .latency
            .get(item.as_str())
            .copied()
            .unwrap_or(self.default_latency);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(item.as_str()) {
            panic!("worker panicked on {item}");
        }
        if self.failing.contains(item.as_str()) {
            return Err(WorkerError::new(item.clone(), "image: unknown format"));
        }
        Ok(Artifact::new(item.clone(), thumb_name(item.as_str())))
    }

    async fn size(&self, artifact: &Artifact) -> std::result::Result<u64, WorkerError> {
        Ok(Self::size_of(artifact.source.as_str()))
    }
}

pub(crate) fn items(names: &[&str]) -> Vec<WorkItem> {
    names.iter().copied().map(WorkItem::from).collect()
}

pub(crate) fn pipeline_with(worker: &Arc<MockWorker>) -> Pipeline {
    pipeline_with_config(worker, PipelineConfig::default())
}

pub(crate) fn pipeline_with_config(worker: &Arc<MockWorker>, config: PipelineConfig) -> Pipeline {
    Pipeline::new(config, Arc::clone(worker) as Arc<dyn ArtifactWorker>).unwrap()
}
