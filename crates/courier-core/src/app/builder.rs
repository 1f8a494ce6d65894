//! BootstrapBuilder - assembles the worker program.
//!
//! `build()` is the fail-fast point: names passed to `expect_functions`
//! must all be registered, otherwise the missing ones are reported.

use std::sync::Arc;

use serde_json::Value;

use crate::config::{CodecConfig, WorkerConfig};
use crate::typed::{Function, FunctionRegistry, PayloadCodec, RegistryError};

use super::bootstrap::Bootstrap;

/// ```ignore
/// let bootstrap = BootstrapBuilder::new()
///     .register(Square)?
///     .register_fn("text.upper.v1", upper)?
///     .expect_functions(&["math.square.v1", "text.upper.v1"])
///     .build()?;
/// ```
pub struct BootstrapBuilder {
    registry: FunctionRegistry,
    expected: Option<Vec<String>>,
    codec: CodecConfig,
    worker: WorkerConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing functions: {0:?}. These were expected but not registered.")]
    MissingFunctions(Vec<String>),
}

impl BootstrapBuilder {
    pub fn new() -> Self {
        Self {
            registry: FunctionRegistry::new(),
            expected: None,
            codec: CodecConfig::default(),
            worker: WorkerConfig::default(),
        }
    }

    pub fn register<F: Function>(mut self, function: F) -> Result<Self, RegistryError> {
        self.registry.register(function)?;
        Ok(self)
    }

    pub fn register_fn<C>(mut self, name: impl Into<String>, f: C) -> Result<Self, RegistryError>
    where
        C: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.registry.register_fn(name, f)?;
        Ok(self)
    }

    /// Names that must be registered by the time `build` runs.
    pub fn expect_functions(mut self, names: &[&str]) -> Self {
        self.expected = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    pub fn codec_config(mut self, config: CodecConfig) -> Self {
        self.codec = config;
        self
    }

    pub fn worker_config(mut self, config: WorkerConfig) -> Self {
        self.worker = config;
        self
    }

    /// Freezes the registry into a shared `Bootstrap`.
    pub fn build(self) -> Result<Arc<Bootstrap>, BuildError> {
        if let Some(expected) = &self.expected {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.registry.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingFunctions(missing));
            }
        }
        Ok(Arc::new(Bootstrap::new(
            self.registry,
            PayloadCodec::new(self.codec),
            self.worker,
        )))
    }
}

impl Default for BootstrapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
