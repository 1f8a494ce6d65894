//! FunctionRegistry - name -> compiled function.
//!
//! Built once during initialization (mutable), then frozen inside a
//! `Bootstrap` and read concurrently by every worker thread.
//!
//! # Points
//! - type-erased `Arc<dyn DynFunction>` values keyed by name
//! - a name is registered at most once
//!
//! # Usage
//! ```ignore
//! let mut registry = FunctionRegistry::new();
//! registry.register(Square)?;
//! registry.register_fn("text.upper.v1", upper)?;
//!
//! let square = registry.get("math.square.v1").unwrap();
//! assert_eq!(square.call_dyn(json!(3))?, json!(9));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::function::{DynFunction, FnFunction, Function, TypedFunction};

#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn DynFunction>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("function '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl FunctionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registers a typed function under `F::NAME`.
    pub fn register<F: Function>(&mut self, function: F) -> Result<(), RegistryError> {
        self.insert(Arc::new(TypedFunction::new(function)))
    }

    /// Registers a closure working on raw `Value`s.
    pub fn register_fn<C>(&mut self, name: impl Into<String>, f: C) -> Result<(), RegistryError>
    where
        C: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.insert(Arc::new(FnFunction::new(name, f)))
    }

    fn insert(&mut self, function: Arc<dyn DynFunction>) -> Result<(), RegistryError> {
        let name = function.name().to_string();
        if self.functions.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.functions.insert(name, function);
        Ok(())
    }

    /// Looks up a function by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn DynFunction>> {
        self.functions.get(name).cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
