//! The per-item worker seam.
//!
//! The pipeline never looks inside an item: it hands each [`WorkItem`] to an
//! [`ArtifactWorker`] and orchestrates around the result.

use std::future::Future;

use crate::types::{Artifact, WorkItem, WorkerError};

/// Converts one item into one artifact, and measures produced artifacts.
///
/// Implementations are called concurrently from many tasks and must not rely
/// on any ordering between calls.
#[async_trait::async_trait]
pub trait ArtifactWorker: Send + Sync {
    /// Produce the artifact for `item`
    ///
    /// The returned artifact's `source` must be `item`.
    async fn process(&self, item: &WorkItem) -> std::result::Result<Artifact, WorkerError>;

    /// Size of a produced artifact in bytes
    ///
    /// The default reads the artifact file's metadata.
    async fn size(&self, artifact: &Artifact) -> std::result::Result<u64, WorkerError> {
        let metadata = tokio::fs::metadata(&artifact.path).await.map_err(|e| {
            WorkerError::new(
                artifact.source.clone(),
                format!("failed to stat {}: {}", artifact.path.display(), e),
            )
        })?;
        Ok(metadata.len())
    }
}

/// [`ArtifactWorker`] backed by an async closure
///
/// Artifact sizes come from the default file-metadata lookup.
///
/// ```
/// use fanout_pipeline::{Artifact, FnWorker, WorkItem, WorkerError};
///
/// let worker = FnWorker::new(|item: WorkItem| async move {
///     let path = format!("{}.thumb", item.as_str());
///     Ok::<_, WorkerError>(Artifact::new(item, path))
/// });
/// # let _ = worker;
/// ```
pub struct FnWorker<F> {
    f: F,
}

impl<F, Fut> FnWorker<F>
where
    F: Fn(WorkItem) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Artifact, WorkerError>> + Send,
{
    /// Wrap a closure
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait::async_trait]
impl<F, Fut> ArtifactWorker for FnWorker<F>
where
    F: Fn(WorkItem) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Artifact, WorkerError>> + Send,
{
    async fn process(&self, item: &WorkItem) -> std::result::Result<Artifact, WorkerError> {
        (self.f)(item.clone()).await
    }
}
