//! Domain model (ids, status, wire record, errors).

pub mod errors;
pub mod ids;
pub mod serialized;
pub mod status;

pub use self::errors::{CodecError, RunnerError, TaskError, TaskFailure, WorkerError};
pub use self::ids::{Id, IdMarker, RunId, TaskId, WorkerId};
pub use self::serialized::SerializedTask;
pub use self::status::{TaskState, TaskStatus};
