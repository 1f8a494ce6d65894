//! Function trait - compiled handlers addressed by name.
//!
//! A task never carries code. It carries the stable name of a function that
//! was compiled into the binary and registered before any worker starts.
//!
//! - **Typed**: `Function` binds a name to concrete input/output types
//! - **Dyn**: `DynFunction` is object-safe and speaks `serde_json::Value`
//! - `TypedFunction<F>` / `FnFunction<C>` erase the former into the latter

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A statically compiled unit of work.
///
/// ```ignore
/// struct Square;
///
/// impl Function for Square {
///     const NAME: &'static str = "math.square.v1";
///     type Input = i64;
///     type Output = i64;
///
///     fn call(&self, input: i64) -> Result<i64, String> {
///         Ok(input * input)
///     }
/// }
/// ```
///
/// Naming convention: `{domain}.{action}.v{major}`.
pub trait Function: Send + Sync + 'static {
    const NAME: &'static str;
    type Input: DeserializeOwned;
    type Output: Serialize;

    /// Runs on a worker thread. `Err` is reported as the task's failure.
    fn call(&self, input: Self::Input) -> Result<Self::Output, String>;
}

/// Object-safe view of a function, storable in the registry.
pub trait DynFunction: Send + Sync {
    fn call_dyn(&self, payload: Value) -> Result<Value, String>;
    fn name(&self) -> &str;
}

pub struct TypedFunction<F: Function> {
    function: F,
}

impl<F: Function> TypedFunction<F> {
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F: Function> DynFunction for TypedFunction<F> {
    fn call_dyn(&self, payload: Value) -> Result<Value, String> {
        let input: F::Input = serde_json::from_value(payload)
            .map_err(|e| format!("invalid input for {}: {e}", F::NAME))?;
        let output = self.function.call(input)?;
        serde_json::to_value(output).map_err(|e| format!("invalid output from {}: {e}", F::NAME))
    }

    fn name(&self) -> &str {
        F::NAME
    }
}

/// Closure-backed function working directly on `Value`.
pub struct FnFunction<C> {
    name: String,
    f: C,
}

impl<C> FnFunction<C>
where
    C: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: C) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<C> DynFunction for FnFunction<C>
where
    C: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
{
    fn call_dyn(&self, payload: Value) -> Result<Value, String> {
        (self.f)(payload)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Point {
        x: i64,
        y: i64,
    }

    struct Manhattan;

    impl Function for Manhattan {
        const NAME: &'static str = "geo.manhattan.v1";
        type Input = Point;
        type Output = i64;

        fn call(&self, input: Point) -> Result<i64, String> {
            Ok(input.x.abs() + input.y.abs())
        }
    }

    #[test]
    fn test_typed_function_decodes_its_input() {
        let f = TypedFunction::new(Manhattan);
        assert_eq!(f.call_dyn(json!({ "x": -2, "y": 3 })).unwrap(), json!(5));
        assert_eq!(f.name(), "geo.manhattan.v1");
    }

    #[test]
    fn test_typed_function_reports_bad_input() {
        let f = TypedFunction::new(Manhattan);
        let err = f.call_dyn(json!({ "x": "nope" })).unwrap_err();
        assert!(err.contains("geo.manhattan.v1"));
    }

    #[test]
    fn test_closure_function_sees_raw_value() {
        let f = FnFunction::new("echo", |v: Value| Ok(v));
        assert_eq!(f.call_dyn(json!([1, 2])).unwrap(), json!([1, 2]));
    }
}
