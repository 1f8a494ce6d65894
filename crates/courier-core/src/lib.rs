//! courier-core
//!
//! Hands units of work (an encoded payload plus the name of a compiled
//! function) to isolated worker threads and collects their results.
//!
//! # Modules
//! - **domain**: ids, status model, wire record, error types
//! - **typed**: function trait, registry, payload codec
//! - **app**: bootstrap (process-wide worker program), builder, runner, status bus
//! - **worker**: one worker thread per handle
//! - **task**: a unit of work driving one worker handle
//! - **config**: codec / worker / runner settings

pub mod app;
pub mod config;
pub mod domain;
pub mod task;
pub mod typed;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{Bootstrap, BootstrapBuilder, Runner, StatusBus};
pub use config::{AggregationPolicy, CodecConfig, RunnerConfig, WorkerConfig};
pub use domain::{
    CodecError, RunnerError, SerializedTask, TaskError, TaskFailure, TaskId, TaskState,
    TaskStatus, WorkerError,
};
pub use task::Task;
pub use typed::{DynFunction, Function, FunctionRegistry, PayloadCodec, RegistryError};
pub use worker::{WorkerHandle, WorkerReply, WorkerRequest};
