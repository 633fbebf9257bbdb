//! Core types and events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier of one unit of work (typically a file path or name)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem(pub String);

impl WorkItem {
    /// Create a new WorkItem
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkItem {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for WorkItem {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output produced by a worker for one [`WorkItem`]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    /// The item this artifact was produced from
    pub source: WorkItem,
    /// Location of the produced artifact
    pub path: PathBuf,
}

impl Artifact {
    /// Create a new Artifact
    pub fn new(source: WorkItem, path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            path: path.into(),
        }
    }

    /// Artifact name as reported to callers
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Failure of the external worker for a single item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{item}: {reason}")]
pub struct WorkerError {
    /// The item that failed
    pub item: WorkItem,
    /// Why it failed
    pub reason: String,
}

impl WorkerError {
    /// Create a new WorkerError
    pub fn new(item: WorkItem, reason: impl Into<String>) -> Self {
        Self {
            item,
            reason: reason.into(),
        }
    }
}

/// Outcome of one Task Unit: the artifact, or the worker's failure
pub type TaskResult = std::result::Result<Artifact, WorkerError>;

/// Identifier of a single pipeline run
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Processing strategy used by a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// One item after another on the calling task
    Sequential,
    /// Spawn and return immediately
    FireAndForget,
    /// Spawn and wait for one presence signal per item
    Rendezvous,
    /// Return on the first failure, abandoning the rest
    FirstErrorNaive,
    /// Collect every result into a conduit sized to the item count
    Buffered,
    /// Stream input with tracked completion, summing artifact sizes
    Tracked,
    /// Fail fast and cancel the remaining units
    Cancelling,
}

impl Variant {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Sequential => "sequential",
            Variant::FireAndForget => "fire_and_forget",
            Variant::Rendezvous => "rendezvous",
            Variant::FirstErrorNaive => "first_error_naive",
            Variant::Buffered => "buffered",
            Variant::Tracked => "tracked",
            Variant::Cancelling => "cancelling",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted during pipeline runs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run was accepted and is about to dispatch
    RunStarted {
        /// Run ID
        run: RunId,
        /// Processing strategy
        variant: Variant,
    },

    /// A Task Unit is about to invoke the worker
    TaskStarted {
        /// Run ID
        run: RunId,
        /// Item being processed
        item: WorkItem,
    },

    /// The worker produced an artifact
    TaskCompleted {
        /// Run ID
        run: RunId,
        /// Item that was processed
        item: WorkItem,
        /// Artifact size, when the run measures artifacts
        #[serde(skip_serializing_if = "Option::is_none")]
        bytes: Option<u64>,
    },

    /// The worker failed
    TaskFailed {
        /// Run ID
        run: RunId,
        /// Item that failed
        item: WorkItem,
        /// Error message
        error: String,
    },

    /// The unit saw the cancellation signal and skipped the worker
    TaskCancelled {
        /// Run ID
        run: RunId,
        /// Item that was skipped
        item: WorkItem,
    },

    /// Every unit of the run terminated and the result conduit was closed
    ConduitClosed {
        /// Run ID
        run: RunId,
    },

    /// The aggregator returned to the caller
    RunFinished {
        /// Run ID
        run: RunId,
        /// Results received with an artifact
        succeeded: usize,
        /// Results received with an error
        failed: usize,
    },

    /// Pipeline is shutting down
    Shutdown,
}
