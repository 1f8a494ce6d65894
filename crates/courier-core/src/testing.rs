//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::app::{Bootstrap, BootstrapBuilder};
use crate::typed::Function;

pub const FIELD_X: &str = "test.field_x.v1";
pub const ECHO: &str = "test.echo.v1";
pub const FAIL: &str = "test.fail.v1";
pub const PANIC: &str = "test.panic.v1";
pub const SLEEP: &str = "test.sleep.v1";

/// Returns `payload.x`.
pub struct FieldX;

#[derive(Deserialize)]
pub struct HasX {
    x: Value,
}

impl Function for FieldX {
    const NAME: &'static str = FIELD_X;
    type Input = HasX;
    type Output = Value;

    fn call(&self, input: HasX) -> Result<Value, String> {
        Ok(input.x)
    }
}

/// Sleeps `ms`, then returns `value`, or fails with `error` if present.
pub struct Sleep;

#[derive(Deserialize)]
pub struct SleepInput {
    ms: u64,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

impl Function for Sleep {
    const NAME: &'static str = SLEEP;
    type Input = SleepInput;
    type Output = Value;

    fn call(&self, input: SleepInput) -> Result<Value, String> {
        std::thread::sleep(Duration::from_millis(input.ms));
        match input.error {
            Some(error) => Err(error),
            None => Ok(input.value),
        }
    }
}

pub fn builder() -> BootstrapBuilder {
    BootstrapBuilder::new()
        .register(FieldX)
        .and_then(|b| b.register(Sleep))
        .and_then(|b| b.register_fn(ECHO, Ok))
        .and_then(|b| b.register_fn(FAIL, |_| Err("intentional failure".to_string())))
        .and_then(|b| {
            b.register_fn(PANIC, |v: Value| {
                panic!("{}", v.as_str().unwrap_or("panic"));
            })
        })
        .expect("fixture functions register once")
}

pub fn bootstrap() -> Arc<Bootstrap> {
    builder().build().expect("fixture bootstrap builds")
}
