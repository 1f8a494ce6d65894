//! Runner - concurrent fan-out over a list of tasks, fan-in of results.
//!
//! # Flow
//! 1. every task is published as `pending`
//! 2. each task is published as `running` when it is dispatched
//! 3. each task is published as `completed` / `failed` when it settles
//!    (completion order)
//! 4. results are put back in submission order and reduced by the
//!    configured `AggregationPolicy`
//!
//! # Points
//! - `buffer_unordered` bounds how many workers exist at once
//! - each future owns a `&mut Task`, so no task is driven twice
//! - status events follow completion order, results follow submission order
//!
//! # Usage
//! ```ignore
//! let mut runner = Runner::new(RunnerConfig::default().with_policy(AggregationPolicy::FailFast));
//! runner.add_task(Task::new(&bootstrap, "t1", json!({ "x": 1 }), "test.field_x.v1")?);
//! let results = runner.run_all().await?;
//! ```

use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{AggregationPolicy, RunnerConfig};
use crate::domain::{RunId, RunnerError, TaskError, TaskFailure, TaskStatus};
use crate::task::Task;

use super::status::StatusBus;

/// Owns a batch of tasks and the status bus they report to.
pub struct Runner {
    config: RunnerConfig,
    tasks: Vec<Task>,
    statuses: Vec<TaskStatus>,
    bus: StatusBus,
}

impl Runner {
    /// Empty runner with its own status bus.
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            tasks: Vec::new(),
            statuses: Vec::new(),
            bus: StatusBus::new(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Appends; duplicate ids are not checked.
    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Tasks in submission order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Status events of every later run, in publish order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TaskStatus> {
        self.bus.subscribe()
    }

    /// Latest status per task from the last run, in submission order.
    pub fn statuses(&self) -> &[TaskStatus] {
        &self.statuses
    }

    /// Status of the first task with this id.
    pub fn status(&self, task_id: &str) -> Option<&TaskStatus> {
        self.statuses.iter().find(|s| s.task_id.as_str() == task_id)
    }

    /// Runs every task concurrently, one worker thread each.
    ///
    /// The returned values are in submission order. Under `CollectPartial`
    /// failed tasks are left out; under `FailFast` any failure turns the
    /// whole call into `RunnerError::Aggregation`. Either way every task
    /// settles and publishes its status before this returns.
    pub async fn run_all(&mut self) -> Result<Vec<Value>, RunnerError> {
        let run_id = RunId::generate();
        let total = self.tasks.len();
        let limit = self.config.max_concurrent_tasks.unwrap_or(total).max(1);
        let timeout = self.config.task_timeout;
        info!(%run_id, tasks = total, policy = ?self.config.policy, limit, "run started");

        self.statuses = self
            .tasks
            .iter()
            .map(|task| TaskStatus::pending(task.id().clone()))
            .collect();
        for status in &self.statuses {
            self.bus.publish(status.clone());
        }

        let bus = &self.bus;
        let mut outcomes: Vec<Option<Result<Value, TaskError>>> = (0..total).map(|_| None).collect();
        let mut settled = stream::iter(self.tasks.iter_mut().enumerate())
            .map(|(index, task)| drive(index, task, bus, timeout))
            .buffer_unordered(limit);
        while let Some((index, status, outcome)) = settled.next().await {
            self.statuses[index] = status;
            outcomes[index] = Some(outcome);
        }
        drop(settled);

        let mut results = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (status, outcome) in self.statuses.iter().zip(outcomes) {
            match outcome {
                Some(Ok(value)) => results.push(value),
                Some(Err(err)) => failures.push(TaskFailure {
                    task_id: status.task_id.clone(),
                    message: err.to_string(),
                }),
                None => {}
            }
        }

        info!(
            %run_id,
            completed = results.len(),
            failed = failures.len(),
            "run finished"
        );

        match self.config.policy {
            AggregationPolicy::CollectPartial => {
                if !failures.is_empty() {
                    warn!(%run_id, failed = failures.len(), "dropping failed tasks from results");
                }
                Ok(results)
            }
            AggregationPolicy::FailFast if failures.is_empty() => Ok(results),
            AggregationPolicy::FailFast => Err(RunnerError::Aggregation { total, failures }),
        }
    }

    /// Kills every task that still owns a worker. Returns how many were killed.
    pub fn kill_all(&mut self) -> usize {
        let killed = self
            .tasks
            .iter_mut()
            .filter_map(|task| task.kill().ok())
            .count();
        debug!(killed, "killed remaining workers");
        killed
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

async fn drive(
    index: usize,
    task: &mut Task,
    bus: &StatusBus,
    timeout: Option<Duration>,
) -> (usize, TaskStatus, Result<Value, TaskError>) {
    let mut status = TaskStatus::pending(task.id().clone());
    status.mark_running();
    bus.publish(status.clone());

    let outcome = match timeout {
        Some(after) => task.run_with_timeout(after).await,
        None => task.run().await,
    };
    match &outcome {
        Ok(value) => status.mark_completed(value.clone()),
        Err(err) => status.mark_failed(err.to_string()),
    };
    bus.publish(status.clone());

    (index, status, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskState;
    use crate::testing;
    use rstest::rstest;
    use serde_json::json;
    use std::sync::Arc;

    use crate::app::Bootstrap;

    fn runner_with(bootstrap: &Arc<Bootstrap>, config: RunnerConfig, specs: &[(&str, Value, &str)]) -> Runner {
        let mut runner = Runner::new(config);
        for (id, payload, function) in specs {
            runner.add_task(Task::new(bootstrap, *id, payload.clone(), function).unwrap());
        }
        runner
    }

    fn example_pair(policy: AggregationPolicy) -> Runner {
        runner_with(
            &testing::bootstrap(),
            RunnerConfig::default().with_policy(policy),
            &[
                ("t1", json!({ "x": 1 }), testing::FIELD_X),
                ("t2", json!({ "x": 2 }), testing::FAIL),
            ],
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TaskStatus>) -> Vec<TaskStatus> {
        let mut events = Vec::new();
        while let Ok(status) = rx.try_recv() {
            events.push(status);
        }
        events
    }

    #[tokio::test]
    async fn test_collect_partial_drops_failures() {
        let mut runner = example_pair(AggregationPolicy::CollectPartial);
        assert_eq!(runner.run_all().await.unwrap(), vec![json!(1)]);

        assert_eq!(runner.status("t1").unwrap().state, TaskState::Completed);
        let t2 = runner.status("t2").unwrap();
        assert_eq!(t2.state, TaskState::Failed);
        assert!(t2.error.as_deref().unwrap().contains("t2"));
    }

    #[tokio::test]
    async fn test_fail_fast_rejects_the_batch() {
        let mut runner = example_pair(AggregationPolicy::FailFast);
        let mut rx = runner.subscribe();

        let err = runner.run_all().await.unwrap_err();
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures()[0].task_id.as_str(), "t2");

        let terminal: Vec<_> = drain(&mut rx).into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal.len(), 2);
        assert_eq!(runner.status("t1").unwrap().result, Some(json!(1)));
    }

    #[rstest]
    #[case::collect_partial(AggregationPolicy::CollectPartial)]
    #[case::fail_fast(AggregationPolicy::FailFast)]
    #[tokio::test]
    async fn test_all_successes_are_returned_under_either_policy(#[case] policy: AggregationPolicy) {
        let mut runner = runner_with(
            &testing::bootstrap(),
            RunnerConfig::default().with_policy(policy),
            &[
                ("a", json!({ "x": "a" }), testing::FIELD_X),
                ("b", json!("b"), testing::ECHO),
            ],
        );
        assert_eq!(runner.run_all().await.unwrap(), vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn test_partial_failure_count() {
        let bootstrap = testing::bootstrap();
        let mut runner = Runner::default();
        let n = 8;
        for i in 0..n {
            let function = if i % 3 == 0 { testing::FAIL } else { testing::FIELD_X };
            let task = Task::new(&bootstrap, format!("t{i}"), json!({ "x": i }), function).unwrap();
            runner.add_task(task);
        }
        let m = (0..n).filter(|i| i % 3 == 0).count();

        let results = runner.run_all().await.unwrap();
        assert_eq!(results.len(), n - m);
        assert_eq!(results, vec![json!(1), json!(2), json!(4), json!(5), json!(7)]);
    }

    #[tokio::test]
    async fn test_results_follow_submission_order_not_completion_order() {
        let mut runner = runner_with(
            &testing::bootstrap(),
            RunnerConfig::default(),
            &[
                ("A", json!({ "ms": 150, "value": "A" }), testing::SLEEP),
                ("B", json!({ "ms": 300, "value": "B" }), testing::SLEEP),
                ("C", json!({ "ms": 0, "value": "C" }), testing::SLEEP),
            ],
        );
        let mut rx = runner.subscribe();

        let results = runner.run_all().await.unwrap();
        assert_eq!(results, vec![json!("A"), json!("B"), json!("C")]);

        let completion: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter(|s| s.is_terminal())
            .map(|s| s.task_id.to_string())
            .collect();
        assert_eq!(completion, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_every_task_goes_pending_running_terminal() {
        let mut runner = example_pair(AggregationPolicy::CollectPartial);
        let mut rx = runner.subscribe();
        runner.run_all().await.unwrap();
        let events = drain(&mut rx);

        for id in ["t1", "t2"] {
            let states: Vec<TaskState> = events
                .iter()
                .filter(|s| s.task_id.as_str() == id)
                .map(|s| s.state)
                .collect();
            assert_eq!(states.len(), 3, "{id}: {states:?}");
            assert_eq!(states[0], TaskState::Pending);
            assert_eq!(states[1], TaskState::Running);
            assert!(states[2].is_terminal());
        }
    }

    #[tokio::test]
    async fn test_large_batch_reports_every_failure() {
        let bootstrap = testing::bootstrap();
        let mut runner = Runner::default();
        let n = 150;
        for i in 0..n {
            runner.add_task(Task::new(&bootstrap, format!("t{i}"), json!(i), testing::FAIL).unwrap());
        }

        let mut rx = runner.subscribe();
        let watcher = tokio::spawn(async move {
            let mut events = Vec::new();
            while let Some(status) = rx.recv().await {
                events.push(status);
            }
            events
        });

        assert!(runner.run_all().await.unwrap().is_empty());
        drop(runner);
        let events = watcher.await.unwrap();

        // pending + running + failed for each task
        assert_eq!(events.len(), 3 * n);
        let failed = events.iter().filter(|s| s.state == TaskState::Failed).count();
        assert_eq!(failed, n);
    }

    #[tokio::test]
    async fn test_empty_runner_yields_empty_results() {
        let mut runner = Runner::new(RunnerConfig::default().with_policy(AggregationPolicy::FailFast));
        assert!(runner.run_all().await.unwrap().is_empty());
        assert!(runner.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_fails_only_the_slow_task() {
        let mut runner = runner_with(
            &testing::bootstrap(),
            RunnerConfig::default().with_task_timeout(Duration::from_millis(50)),
            &[
                ("fast", json!({ "ms": 0, "value": 1 }), testing::SLEEP),
                ("slow", json!({ "ms": 1_000, "value": 2 }), testing::SLEEP),
            ],
        );
        assert_eq!(runner.run_all().await.unwrap(), vec![json!(1)]);

        let slow = runner.status("slow").unwrap();
        assert_eq!(slow.state, TaskState::Failed);
        assert!(slow.error.as_deref().unwrap().contains("timed out"));
        assert!(!runner.tasks()[1].has_handle());
    }

    #[tokio::test]
    async fn test_concurrency_cap_serializes_execution() {
        let mut runner = runner_with(
            &testing::bootstrap(),
            RunnerConfig::default().with_max_concurrent_tasks(1),
            &[
                ("first", json!({ "ms": 100, "value": 1 }), testing::SLEEP),
                ("second", json!({ "ms": 0, "value": 2 }), testing::SLEEP),
            ],
        );
        let mut rx = runner.subscribe();
        runner.run_all().await.unwrap();

        let terminal: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter(|s| s.is_terminal())
            .map(|s| s.task_id.to_string())
            .collect();
        assert_eq!(terminal, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_kill_all_is_best_effort() {
        let mut runner = example_pair(AggregationPolicy::CollectPartial);
        assert_eq!(runner.kill_all(), 0);

        runner.run_all().await.unwrap();
        assert_eq!(runner.kill_all(), 2);
        assert_eq!(runner.kill_all(), 0);
        assert!(runner.tasks().iter().all(|t| !t.has_handle()));
    }

    #[tokio::test]
    async fn test_run_without_subscribers() {
        let mut runner = example_pair(AggregationPolicy::CollectPartial);
        assert_eq!(runner.bus.subscriber_count(), 0);
        assert_eq!(runner.run_all().await.unwrap().len(), 1);
    }
}
