//! StatusBus - fan-out of task status transitions.
//!
//! # Delivery
//! - each subscriber owns an unbounded `mpsc` queue, so no event is dropped
//!   while the receiver is alive
//! - events arrive in publish order, which for a run is completion order
//! - publishing never waits; senders whose receiver is gone are pruned
//!
//! # Usage
//! ```ignore
//! let mut rx = runner.subscribe();
//! tokio::spawn(async move {
//!     while let Some(status) = rx.recv().await {
//!         println!("{} -> {:?}", status.task_id, status.state);
//!     }
//! });
//! ```

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::domain::TaskStatus;

#[derive(Debug, Default)]
pub struct StatusBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<TaskStatus>>>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new stream that sees every event published from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TaskStatus> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Delivers `status` to every live subscriber.
    pub fn publish(&self, status: TaskStatus) {
        tracing::trace!(task_id = %status.task_id, state = ?status.state, "status");
        self.lock().retain(|tx| tx.send(status.clone()).is_ok());
    }

    /// Live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<TaskStatus>>> {
        // the guarded Vec is valid after any panic
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
