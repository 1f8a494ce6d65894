//! App - wiring of functions, workers and tasks.
//!
//! - **Bootstrap**: the shared worker program (registry + codec + worker settings)
//! - **BootstrapBuilder**: assembles and validates a `Bootstrap`
//! - **Runner**: concurrent execution and aggregation of tasks
//! - **StatusBus**: per-subscriber stream of task status transitions

pub mod bootstrap;
pub mod builder;
pub mod runner;
pub mod status;

pub use self::bootstrap::{Bootstrap, BootstrapError};
pub use self::builder::{BootstrapBuilder, BuildError};
pub use self::runner::Runner;
pub use self::status::StatusBus;
