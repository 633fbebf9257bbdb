//! # fanout-pipeline
//!
//! Concurrent fan-out/fan-in processing for tokio: hand each work item to a
//! worker on its own task, collect the per-item results, and never lose track
//! of a task.
//!
//! ## Design Philosophy
//!
//! - **No task leaks** - every spawned unit is counted before it starts and
//!   released on every exit path; a panicking worker call is reported as a
//!   failure of its item
//! - **Closed exactly once** - a result conduit closes only after every unit
//!   writing to it has terminated
//! - **Strategies side by side** - sequential, fire-and-forget, rendezvous,
//!   naive first-error, buffered, tracked and cancelling variants share one
//!   worker and one set of counters
//! - **Library-first** - no CLI, no logging subscriber; [`Event`]s and
//!   structured `tracing` events are there for the embedding application
//!
//! ## Quick Start
//!
//! ```no_run
//! use fanout_pipeline::{Artifact, FnWorker, Pipeline, PipelineConfig, WorkItem, WorkerError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let worker = FnWorker::new(|item: WorkItem| async move {
//!         let thumb = format!("{}.thumb.jpg", item.as_str().trim_end_matches(".jpg"));
//!         Ok::<_, WorkerError>(Artifact::new(item, thumb))
//!     });
//!     let pipeline = Pipeline::with_worker(PipelineConfig::default(), worker)?;
//!
//!     // Fail after everything finished, or get every artifact.
//!     let items = ["a.jpg", "b.jpg", "c.jpg"].map(WorkItem::from);
//!     let thumbs = pipeline.run_buffered(items).await?;
//!     println!("made {} thumbnails", thumbs.len());
//!
//!     // Unknown number of items: sum artifact sizes while they stream in.
//!     let (tx, rx) = pipeline.item_channel();
//!     tokio::spawn(async move {
//!         for name in ["d.jpg", "e.jpg"] {
//!             if tx.send(WorkItem::from(name)).await.is_err() {
//!                 break;
//!             }
//!         }
//!     });
//!     let bytes = pipeline.run_tracked_channel(rx).await;
//!     println!("{bytes} bytes of thumbnails");
//!
//!     pipeline.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Fan-out/fan-in pipeline and its processing variants
pub mod pipeline;
/// Cumulative counters
pub mod stats;
/// Completion tracking
pub mod tracker;
/// Core types and events
pub mod types;
/// Per-item worker seam
pub mod worker;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pipeline::{BatchOutcome, Pipeline};
pub use stats::StatsSnapshot;
pub use tracker::{ActiveTracker, TaskGuard};
pub use types::{Artifact, Event, RunId, TaskResult, Variant, WorkItem, WorkerError};
pub use worker::{ArtifactWorker, FnWorker};
