//! Task - one unit of work and the worker that runs it.
//!
//! # Lifecycle
//! - `new` / `from_typed` validate the id, the payload and the function
//! - `update_*` keep the encoded payload in step with the payload
//! - `run` spawns a `WorkerHandle`, sends once, awaits once
//! - `kill` terminates the owned handle
//!
//! # Usage
//! ```ignore
//! let mut task = Task::new(&bootstrap, "t1", json!({ "x": 1 }), "test.field_x.v1")?;
//! assert_eq!(task.run().await?, json!(1));
//! task.kill()?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::app::Bootstrap;
use crate::domain::{CodecError, SerializedTask, TaskError, TaskId};
use crate::worker::{WorkerHandle, WorkerRequest};

/// A payload, its encoded form, and the name of the function to apply.
///
/// Invariants:
/// - `decode(encoded_payload) == payload`, re-established on every mutation
/// - `function_source` resolves in the bootstrap's registry
/// - at most one `WorkerHandle` is owned, never shared
pub struct Task {
    id: TaskId,
    payload: Value,
    encoded_payload: Arc<[u8]>,
    function_source: String,
    handle: Option<WorkerHandle>,
    bootstrap: Arc<Bootstrap>,
}

impl Task {
    /// `payload` of `None` means "not provided". Any provided value,
    /// including `null` and empty containers, is accepted.
    pub fn new(
        bootstrap: &Arc<Bootstrap>,
        id: impl Into<String>,
        payload: impl Into<Option<Value>>,
        function: &str,
    ) -> Result<Self, TaskError> {
        let id = TaskId::new(id)?;
        let payload = payload.into().ok_or(TaskError::MissingPayload)?;
        if !bootstrap.resolves(function) {
            return Err(TaskError::InvalidFunction(function.to_string()));
        }
        let encoded_payload = bootstrap.codec().encode(&payload)?;

        Ok(Self {
            id,
            payload,
            encoded_payload: encoded_payload.into(),
            function_source: function.to_string(),
            handle: None,
            bootstrap: Arc::clone(bootstrap),
        })
    }

    /// Like [`Task::new`] for any serializable payload.
    pub fn from_typed<T: Serialize>(
        bootstrap: &Arc<Bootstrap>,
        id: impl Into<String>,
        payload: &T,
        function: &str,
    ) -> Result<Self, TaskError> {
        let payload =
            serde_json::to_value(payload).map_err(|e| CodecError::Encode(e.to_string()))?;
        Self::new(bootstrap, id, payload, function)
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The CBOR bytes a worker receives.
    pub fn encoded_payload(&self) -> &[u8] {
        &self.encoded_payload
    }

    pub fn function_source(&self) -> &str {
        &self.function_source
    }

    /// Whether a worker from the last run is still owned.
    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub fn decode_payload(&self) -> Result<Value, CodecError> {
        self.bootstrap.codec().decode(&self.encoded_payload)
    }

    /// Re-encodes. Large payloads are encoded on the blocking pool.
    /// The task is left untouched if encoding fails.
    pub async fn update_payload(
        &mut self,
        payload: impl Into<Option<Value>>,
    ) -> Result<(), TaskError> {
        let payload = payload.into().ok_or(TaskError::MissingPayload)?;
        let (payload, encoded) = self.bootstrap.codec().encode_auto(payload).await?;
        self.payload = payload;
        self.encoded_payload = encoded.into();
        debug!(task_id = %self.id, bytes = self.encoded_payload.len(), "payload updated");
        Ok(())
    }

    /// `None` or an unregistered name leaves the task unchanged.
    pub fn update_function(&mut self, function: Option<&str>) -> Result<(), TaskError> {
        let function = function
            .filter(|name| self.bootstrap.resolves(name))
            .ok_or(TaskError::MissingFunction)?;
        self.function_source = function.to_string();
        Ok(())
    }

    /// True iff the encoded payload decodes and the function resolves.
    pub fn validate(&self) -> bool {
        self.decode_payload().is_ok() && self.bootstrap.resolves(&self.function_source)
    }

    /// Flat `SerializedTask` form.
    pub fn to_record(&self) -> SerializedTask {
        SerializedTask {
            id: self.id.to_string(),
            data: self.encoded_payload.to_vec(),
            func: self.function_source.clone(),
        }
    }

    /// Rebuilds a task, checking the bytes decode and the function resolves.
    pub fn from_record(bootstrap: &Arc<Bootstrap>, record: SerializedTask) -> Result<Self, TaskError> {
        let id = TaskId::new(record.id)?;
        let payload = bootstrap.codec().decode(&record.data)?;
        if !bootstrap.resolves(&record.func) {
            return Err(TaskError::InvalidFunction(record.func));
        }
        Ok(Self {
            id,
            payload,
            encoded_payload: record.data.into(),
            function_source: record.func,
            handle: None,
            bootstrap: Arc::clone(bootstrap),
        })
    }

    /// Wire form: `{"id": .., "data": [..], "func": ..}`.
    pub fn serialize(&self) -> Result<String, TaskError> {
        Ok(self.to_record().to_json()?)
    }

    pub fn deserialize(bootstrap: &Arc<Bootstrap>, text: &str) -> Result<Self, TaskError> {
        Self::from_record(bootstrap, SerializedTask::from_json(text)?)
    }

    /// Runs the function on a fresh worker thread and waits for its reply.
    ///
    /// A handle left from an earlier run is terminated first. The new handle
    /// stays owned after the reply so `kill` can release it.
    pub async fn run(&mut self) -> Result<Value, TaskError> {
        if let Some(mut previous) = self.handle.take() {
            previous.terminate();
        }

        let mut handle = WorkerHandle::spawn(&self.bootstrap)?;
        debug!(
            task_id = %self.id,
            worker_id = %handle.id(),
            function = %self.function_source,
            "dispatching task"
        );
        handle.send(WorkerRequest {
            function_source: self.function_source.clone(),
            payload: Arc::clone(&self.encoded_payload),
        })?;

        let reply = self.handle.insert(handle).reply().await?;
        match reply {
            Ok(result) => {
                debug!(task_id = %self.id, "task completed");
                Ok(result)
            }
            Err(message) => {
                warn!(task_id = %self.id, error = %message, "task failed");
                Err(TaskError::Execution {
                    id: self.id.clone(),
                    message,
                })
            }
        }
    }

    /// `run` with a deadline. On expiry the worker is killed and its reply
    /// discarded.
    pub async fn run_with_timeout(&mut self, after: Duration) -> Result<Value, TaskError> {
        let outcome = tokio::time::timeout(after, self.run()).await;
        match outcome {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(task_id = %self.id, ?after, "task timed out");
                if let Some(mut handle) = self.handle.take() {
                    handle.terminate();
                }
                Err(TaskError::Timeout {
                    id: self.id.clone(),
                    after,
                })
            }
        }
    }

    /// Terminates the owned worker and releases it.
    pub fn kill(&mut self) -> Result<(), TaskError> {
        let mut handle = self
            .handle
            .take()
            .ok_or_else(|| TaskError::NoHandle(self.id.clone()))?;
        handle.terminate();
        Ok(())
    }
}

/// Deep copy with the same id and no worker handle.
impl Clone for Task {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            payload: self.payload.clone(),
            encoded_payload: Arc::from(&self.encoded_payload[..]),
            function_source: self.function_source.clone(),
            handle: None,
            bootstrap: Arc::clone(&self.bootstrap),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("function_source", &self.function_source)
            .field("encoded_len", &self.encoded_payload.len())
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
