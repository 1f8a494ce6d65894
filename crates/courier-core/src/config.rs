//! Configuration types.
//!
//! Every struct has a `Default` and deserializes with `#[serde(default)]`,
//! so a partial JSON document only overrides the keys it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Payload codec settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Payloads whose JSON rendering is longer than this many bytes are
    /// encoded on the blocking pool instead of inline.
    pub large_payload_threshold: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            large_payload_threshold: 100_000,
        }
    }
}

/// Worker thread settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Thread names are `{prefix}-{worker id}`.
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "courier-worker".to_string(),
            stack_size: None,
        }
    }
}

/// How a batch of outcomes is reduced to one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Failed tasks are left out of the result array; the batch succeeds.
    #[default]
    CollectPartial,

    /// Any failure fails the batch with `RunnerError::Aggregation`.
    FailFast,
}

/// Runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub policy: AggregationPolicy,

    /// Upper bound on tasks executing at once. `None` runs all of them.
    pub max_concurrent_tasks: Option<usize>,

    /// Per-task deadline, in milliseconds on the wire. `None` waits forever.
    #[serde(with = "millis")]
    pub task_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            policy: AggregationPolicy::default(),
            max_concurrent_tasks: None,
            task_timeout: None,
        }
    }
}

impl RunnerConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn with_policy(mut self, policy: AggregationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_concurrent_tasks(mut self, limit: usize) -> Self {
        self.max_concurrent_tasks = Some(limit);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let ms = Option::<u64>::deserialize(deserializer)?;
        Ok(ms.map(Duration::from_millis))
    }
}
