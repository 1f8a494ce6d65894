//! Bootstrap - the program every worker thread runs.
//!
//! A `Bootstrap` bundles the frozen function registry, the shared codec and
//! the worker settings. It is built once and shared (`Arc`) by every
//! `WorkerHandle`; no per-spawn setup happens.
//!
//! One instance may be installed process-wide with [`Bootstrap::install`].
//! Installation is init-once: later attempts fail instead of replacing it.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use crate::config::WorkerConfig;
use crate::typed::{FunctionRegistry, PayloadCodec};
use crate::worker::{WorkerReply, WorkerRequest};

use super::builder::BootstrapBuilder;

static GLOBAL: OnceLock<Arc<Bootstrap>> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("a process-wide bootstrap is already installed")]
    AlreadyInstalled,

    #[error("no process-wide bootstrap has been installed")]
    NotInstalled,
}

pub struct Bootstrap {
    registry: FunctionRegistry,
    codec: PayloadCodec,
    worker: WorkerConfig,
}

impl Bootstrap {
    pub fn builder() -> BootstrapBuilder {
        BootstrapBuilder::new()
    }

    pub(crate) fn new(registry: FunctionRegistry, codec: PayloadCodec, worker: WorkerConfig) -> Self {
        Self {
            registry,
            codec,
            worker,
        }
    }

    /// Installs `bootstrap` as the process-wide instance.
    pub fn install(bootstrap: Arc<Bootstrap>) -> Result<Arc<Bootstrap>, BootstrapError> {
        GLOBAL
            .set(Arc::clone(&bootstrap))
            .map_err(|_| BootstrapError::AlreadyInstalled)?;
        tracing::debug!(
            functions = bootstrap.registry.len(),
            "installed process-wide bootstrap"
        );
        Ok(bootstrap)
    }

    /// Returns the installed instance, or installs the one `init` builds.
    pub fn get_or_install(init: impl FnOnce() -> Arc<Bootstrap>) -> Arc<Bootstrap> {
        Arc::clone(GLOBAL.get_or_init(init))
    }

    /// The installed instance, if any.
    pub fn global() -> Result<Arc<Bootstrap>, BootstrapError> {
        GLOBAL.get().cloned().ok_or(BootstrapError::NotInstalled)
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn codec(&self) -> &PayloadCodec {
        &self.codec
    }

    pub fn worker_config(&self) -> &WorkerConfig {
        &self.worker
    }

    /// Whether a worker could run `function`.
    pub fn resolves(&self, function: &str) -> bool {
        self.registry.contains(function)
    }

    /// Worker-side entry point: resolve, decode, invoke.
    ///
    /// Every failure, including a panic inside the function, comes back as
    /// a single `Err` message.
    pub fn execute(&self, request: WorkerRequest) -> WorkerReply {
        let function = self
            .registry
            .get(&request.function_source)
            .ok_or_else(|| format!("function '{}' is not registered", request.function_source))?;
        let input = self.codec.decode(&request.payload).map_err(|e| e.to_string())?;

        match panic::catch_unwind(AssertUnwindSafe(|| function.call_dyn(input))) {
            Ok(reply) => reply,
            Err(payload) => Err(panic_message(payload.as_ref())),
        }
    }
}

impl fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("functions", &self.registry.registered_names())
            .field("codec", &self.codec)
            .field("worker", &self.worker)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("function panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("function panicked: {s}")
    } else {
        "function panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use crate::typed::codec;
    use serde_json::json;

    fn request(function: &str, payload: serde_json::Value) -> WorkerRequest {
        WorkerRequest {
            function_source: function.to_string(),
            payload: codec::encode(&payload).unwrap().into(),
        }
    }

    #[test]
    fn test_execute_runs_the_named_function() {
        let bootstrap = testing::bootstrap();
        let reply = bootstrap.execute(request(testing::FIELD_X, json!({ "x": 1 })));
        assert_eq!(reply, Ok(json!(1)));
    }

    #[test]
    fn test_unknown_function_is_an_error_reply() {
        let bootstrap = testing::bootstrap();
        let reply = bootstrap.execute(request("nope.v1", json!(null)));
        assert!(reply.unwrap_err().contains("nope.v1"));
    }

    #[test]
    fn test_undecodable_payload_is_an_error_reply() {
        let bootstrap = testing::bootstrap();
        let reply = bootstrap.execute(WorkerRequest {
            function_source: testing::ECHO.to_string(),
            payload: vec![0xffu8, 0xff].into(),
        });
        assert!(reply.unwrap_err().starts_with("decode failed"));
    }

    #[test]
    fn test_panics_are_caught() {
        let bootstrap = testing::bootstrap();
        let reply = bootstrap.execute(request(testing::PANIC, json!("kaboom")));
        assert_eq!(reply, Err("function panicked: kaboom".to_string()));
    }

    #[test]
    fn test_install_is_once_per_process() {
        let first = Bootstrap::install(testing::bootstrap()).unwrap();

        let second = Bootstrap::install(testing::bootstrap());
        assert!(matches!(second, Err(BootstrapError::AlreadyInstalled)));

        let global = Bootstrap::global().unwrap();
        assert!(Arc::ptr_eq(&first, &global));

        let again = Bootstrap::get_or_install(testing::bootstrap);
        assert!(Arc::ptr_eq(&first, &again));
    }
}
