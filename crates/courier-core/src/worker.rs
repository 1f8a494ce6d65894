use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;
use tracing::debug;

use crate::app::Bootstrap;
use crate::domain::{WorkerError, WorkerId};

/// The one message a worker receives.
///
/// `payload` is a shared handle to immutable encoded bytes: the worker reads
/// them without a copy while the task keeps its own handle.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub function_source: String,
    pub payload: Arc<[u8]>,
}

/// The function's raw result, or a human-readable failure.
pub type WorkerReply = Result<serde_json::Value, String>;

/// Owns exactly one worker thread.
///
/// Lifecycle: `spawn` -> `send` (once) -> `reply` (once) -> `terminate`.
///
/// Nothing mutable is shared with the thread: the request goes over one
/// oneshot and the reply comes back over another. `terminate` closes both
/// ends. An OS thread cannot be pre-empted, so a function already running
/// finishes on its own; its reply finds the channel closed and is dropped.
pub struct WorkerHandle {
    id: WorkerId,
    request_tx: Option<oneshot::Sender<WorkerRequest>>,
    reply_rx: Option<oneshot::Receiver<WorkerReply>>,
    thread: Option<JoinHandle<()>>,
    terminated: bool,
}

impl WorkerHandle {
    pub fn spawn(bootstrap: &Arc<Bootstrap>) -> Result<Self, WorkerError> {
        let id = WorkerId::generate();
        let (request_tx, request_rx) = oneshot::channel::<WorkerRequest>();
        let (reply_tx, reply_rx) = oneshot::channel::<WorkerReply>();

        let config = bootstrap.worker_config();
        let mut builder =
            thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let program = Arc::clone(bootstrap);
        let thread = builder.spawn(move || {
            // plain OS thread, so blocking on the oneshot is fine
            let Ok(request) = request_rx.blocking_recv() else {
                debug!(worker_id = %id, "worker closed before receiving a request");
                return;
            };
            let reply = program.execute(request);
            if reply_tx.send(reply).is_err() {
                debug!(worker_id = %id, "reply dropped, worker was terminated");
            }
        })?;

        debug!(worker_id = %id, "worker spawned");
        Ok(Self {
            id,
            request_tx: Some(request_tx),
            reply_rx: Some(reply_rx),
            thread: Some(thread),
            terminated: false,
        })
    }

    /// Id used in the thread name and in log fields.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// `true` once `terminate` has run.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Posts the single request.
    pub fn send(&mut self, request: WorkerRequest) -> Result<(), WorkerError> {
        if self.terminated {
            return Err(WorkerError::Terminated);
        }
        let tx = self.request_tx.take().ok_or(WorkerError::AlreadySent)?;
        tx.send(request).map_err(|_| WorkerError::Disconnected)
    }

    /// Waits for the single reply.
    pub async fn reply(&mut self) -> Result<WorkerReply, WorkerError> {
        if self.terminated {
            return Err(WorkerError::Terminated);
        }
        let rx = self.reply_rx.as_mut().ok_or(WorkerError::NoReplyPending)?;
        let reply = rx.await.map_err(|_| WorkerError::Disconnected);
        self.reply_rx = None;
        reply
    }

    /// Stops the worker; a second call is a no-op.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.request_tx = None;
        self.reply_rx = None;
        // detach: the thread exits on its own once its channels are gone
        self.thread = None;
        debug!(worker_id = %self.id, "worker terminated");
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}
