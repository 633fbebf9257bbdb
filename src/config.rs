//! Configuration types for fanout-pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Pipeline configuration
///
/// Every field has a default, so an empty JSON object is a valid configuration.
/// Call [`PipelineConfig::validate`] (done by [`crate::Pipeline::new`]) before use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of Task Units invoking the worker at once (None = unlimited)
    ///
    /// Units beyond the limit are still spawned and counted as in flight; they
    /// wait for a permit inside the unit, never in the dispatch loop.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Capacity of the channel returned by [`crate::Pipeline::item_channel`] (default: 1)
    ///
    /// A capacity of 1 makes the producer hand items over almost in lockstep
    /// with the dispatcher.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Broadcast buffer for [`crate::Event`] subscribers (default: 1000)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Per-task worker timeout in milliseconds (None = no timeout)
    ///
    /// A timed-out worker call counts as a failure of that item.
    #[serde(default, with = "optional_duration_ms_serde")]
    pub task_timeout: Option<Duration>,

    /// How long [`crate::Pipeline::shutdown`] waits for in-flight units, in seconds (default: 30)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Log suppressed per-item failures at `warn` instead of `debug` (default: true)
    #[serde(default = "default_true")]
    pub log_worker_errors: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            stream_buffer: default_stream_buffer(),
            event_capacity: default_event_capacity(),
            task_timeout: None,
            shutdown_timeout: default_shutdown_timeout(),
            log_worker_errors: true,
        }
    }
}

impl PipelineConfig {
    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == Some(0) {
            return Err(Error::config(
                "max_concurrency must be greater than zero (omit it for unlimited)",
                "max_concurrency",
            ));
        }
        if self.stream_buffer == 0 {
            return Err(Error::config(
                "stream_buffer must be greater than zero",
                "stream_buffer",
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::config(
                "event_capacity must be greater than zero",
                "event_capacity",
            ));
        }
        if self.task_timeout == Some(Duration::ZERO) {
            return Err(Error::config(
                "task_timeout must be greater than zero (omit it to disable)",
                "task_timeout",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }
}

fn default_stream_buffer() -> usize {
    1
}

fn default_event_capacity() -> usize {
    1000
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration in milliseconds
mod optional_duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
