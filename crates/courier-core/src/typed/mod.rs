//! Typed - compiled functions, their registry, and the payload codec.
//!
//! Two layers:
//! - **Typed**: `Function` trait with associated input/output types
//! - **Dyn**: `DynFunction`, object-safe, what the registry stores

pub mod codec;
pub mod function;
pub mod registry;

pub use self::codec::PayloadCodec;
pub use self::function::{DynFunction, FnFunction, Function, TypedFunction};
pub use self::registry::{FunctionRegistry, RegistryError};
