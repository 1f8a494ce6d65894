//! Error types, one enum per layer.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::ids::TaskId;

/// Failures of the payload codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("decode left {remaining} trailing bytes")]
    TrailingBytes { remaining: usize },

    #[error("offloaded encoder did not finish: {0}")]
    Join(String),
}

/// Failures of a worker handle itself (not of the function it runs).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker already received its request")]
    AlreadySent,

    #[error("worker has no reply pending")]
    NoReplyPending,

    #[error("worker was terminated")]
    Terminated,

    #[error("worker exited without replying")]
    Disconnected,
}

/// Errors raised by `Task` construction, mutation and execution.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task id must not be empty")]
    InvalidId,

    #[error("payload was not provided")]
    MissingPayload,

    #[error("function '{0}' is not registered")]
    InvalidFunction(String),

    #[error("function was not provided or is not registered")]
    MissingFunction,

    #[error("payload encoding failed: {0}")]
    Encoding(#[from] CodecError),

    #[error("malformed task record: {0}")]
    Wire(#[from] serde_json::Error),

    #[error("task {id} failed: {message}")]
    Execution { id: TaskId, message: String },

    #[error("task {id} timed out after {after:?}")]
    Timeout { id: TaskId, after: Duration },

    #[error("task {0} has no worker handle")]
    NoHandle(TaskId),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// One failed task inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub message: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task_id, self.message)
    }
}

/// Errors raised by `Runner::run_all`.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Raised only under `AggregationPolicy::FailFast`.
    /// `failures` is in submission order.
    #[error("{} of {total} tasks failed: {}", .failures.len(), summarize(.failures))]
    Aggregation {
        total: usize,
        failures: Vec<TaskFailure>,
    },
}

impl RunnerError {
    pub fn failures(&self) -> &[TaskFailure] {
        match self {
            RunnerError::Aggregation { failures, .. } => failures,
        }
    }
}

fn summarize(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
