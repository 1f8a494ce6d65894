use std::error::Error;

use courier_core::app::Bootstrap;
use courier_core::{Function, Runner, RunnerConfig, Task, TaskStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Deserialize)]
struct Greeting {
    name: String,
}

struct Greet;

impl Function for Greet {
    const NAME: &'static str = "text.greet.v1";
    type Input = Greeting;
    type Output = String;

    fn call(&self, input: Greeting) -> Result<String, String> {
        Ok(format!("Hello, {}!", input.name))
    }
}

#[derive(Debug, Deserialize)]
struct Division {
    numerator: f64,
    denominator: f64,
}

#[derive(Debug, Serialize)]
struct Quotient {
    value: f64,
}

struct Divide;

impl Function for Divide {
    const NAME: &'static str = "math.divide.v1";
    type Input = Division;
    type Output = Quotient;

    fn call(&self, input: Division) -> Result<Quotient, String> {
        if input.denominator == 0.0 {
            return Err("division by zero".to_string());
        }
        Ok(Quotient {
            value: input.numerator / input.denominator,
        })
    }
}

fn word_count(payload: Value) -> Result<Value, String> {
    let text = payload.as_str().ok_or("expected a string")?;
    Ok(json!(text.split_whitespace().count()))
}

/// `COURIER_RUNNER_CONFIG` may hold a JSON `RunnerConfig`, e.g.
/// `{"policy":"fail_fast","task_timeout":2000}`.
fn runner_config() -> Result<RunnerConfig, serde_json::Error> {
    match std::env::var("COURIER_RUNNER_CONFIG") {
        Ok(text) => RunnerConfig::from_json(&text),
        Err(_) => Ok(RunnerConfig::default()),
    }
}

/// Logs every status event; the count is returned once the stream closes.
fn watch_statuses(mut statuses: UnboundedReceiver<TaskStatus>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut seen = 0;
        // ends once the runner, and with it the bus, is dropped
        while let Some(status) = statuses.recv().await {
            seen += 1;
            info!(
                task_id = %status.task_id,
                state = ?status.state,
                error = status.error.as_deref().unwrap_or(""),
                "status"
            );
        }
        seen
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // (A) compile-time function table, installed once for the process
    let bootstrap = Bootstrap::builder()
        .register(Greet)?
        .register(Divide)?
        .register_fn("text.word_count.v1", word_count)?
        .expect_functions(&[Greet::NAME, Divide::NAME, "text.word_count.v1"])
        .build()?;
    let bootstrap = Bootstrap::install(bootstrap)?;

    // (B) tasks: payload + function name
    let config = runner_config()?;
    info!(policy = ?config.policy, "runner configured");
    let mut runner = Runner::new(config);
    runner.add_task(Task::new(&bootstrap, "greet", json!({ "name": "courier" }), Greet::NAME)?);
    runner.add_task(Task::new(
        &bootstrap,
        "divide",
        json!({ "numerator": 1.0, "denominator": 4.0 }),
        Divide::NAME,
    )?);
    runner.add_task(Task::new(
        &bootstrap,
        "divide-by-zero",
        json!({ "numerator": 1.0, "denominator": 0.0 }),
        Divide::NAME,
    )?);
    runner.add_task(Task::new(
        &bootstrap,
        "words",
        json!("the quick brown fox"),
        "text.word_count.v1",
    )?);

    // (C) status stream, in completion order
    let watcher = watch_statuses(runner.subscribe());

    // (D) run, report, tear down
    let outcome = runner.run_all().await;
    runner.kill_all();
    drop(runner);
    let seen = watcher.await?;
    info!(events = seen, "status watcher finished");

    let results = outcome?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
