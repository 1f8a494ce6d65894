//! Task status as observed by the runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// State transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Failed
///
/// Nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// Snapshot of one task's progress.
///
/// `result` is only set when `Completed`, `error` only when `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub state: TaskState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStatus {
    pub fn pending(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: TaskState::Pending,
            start_time: None,
            end_time: None,
            result: None,
            error: None,
        }
    }

    /// Pending -> Running. Returns whether the transition applied.
    pub fn mark_running(&mut self) -> bool {
        if self.state != TaskState::Pending {
            return false;
        }
        self.state = TaskState::Running;
        self.start_time = Some(Utc::now());
        true
    }

    /// Running -> Completed. Returns whether the transition applied.
    pub fn mark_completed(&mut self, result: serde_json::Value) -> bool {
        if self.state != TaskState::Running {
            return false;
        }
        self.state = TaskState::Completed;
        self.end_time = Some(Utc::now());
        self.result = Some(result);
        true
    }

    /// Running -> Failed. Returns whether the transition applied.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> bool {
        if self.state != TaskState::Running {
            return false;
        }
        self.state = TaskState::Failed;
        self.end_time = Some(Utc::now());
        self.error = Some(error.into());
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
