//! Heartbeat tick loop.
//!
//! Wraps a [`HeartbeatScheduler`] in a tokio task that ticks on a fixed
//! interval. Each tick runs the due parallel-safe tasks concurrently on the
//! blocking pool, then the remaining due tasks one at a time, then the
//! sequential phase. Successful tasks are marked completed at the tick's
//! reference time.

use crate::scheduler::heartbeat::HeartbeatScheduler;
use crate::scheduler::tasks::{RunPhase, ScheduledTask, TaskResult, TaskRunOutcome, TaskRunRecord};
use chrono::{Local, NaiveDateTime};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default interval between ticks.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Callback that performs a task's work.
///
/// Runs on tokio's blocking pool, so it may block. A panic is reported as a
/// failed run.
pub type TaskExecutor = Arc<dyn Fn(&ScheduledTask) -> TaskResult + Send + Sync>;

/// Everything that ran during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// One record per executed task, in execution-phase order.
    pub records: Vec<TaskRunRecord>,
}

impl TickReport {
    /// Names of tasks that succeeded.
    pub fn succeeded(&self) -> Vec<&str> {
        self.names_with(TaskRunOutcome::Success)
    }

    /// Names of tasks that failed.
    pub fn failed(&self) -> Vec<&str> {
        self.names_with(TaskRunOutcome::Error)
    }

    /// Names of tasks that ran in `phase`.
    pub fn in_phase(&self, phase: RunPhase) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.phase == phase)
            .map(|r| r.name.as_str())
            .collect()
    }

    fn names_with(&self, outcome: TaskRunOutcome) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.outcome == outcome)
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// Drives a [`HeartbeatScheduler`] on a timer.
pub struct HeartbeatRunner {
    scheduler: HeartbeatScheduler,
    executor: TaskExecutor,
    tick_interval: Duration,
    /// Optional sink for run records.
    result_tx: Option<mpsc::UnboundedSender<TaskRunRecord>>,
}

impl HeartbeatRunner {
    /// Create a runner around an (optionally unloaded) scheduler.
    pub fn new(scheduler: HeartbeatScheduler, executor: TaskExecutor) -> Self {
        Self {
            scheduler,
            executor,
            tick_interval: DEFAULT_TICK_INTERVAL,
            result_tx: None,
        }
    }

    /// Override the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Send a [`TaskRunRecord`] for every executed task.
    pub fn with_results(mut self, tx: mpsc::UnboundedSender<TaskRunRecord>) -> Self {
        self.result_tx = Some(tx);
        self
    }

    /// The wrapped scheduler.
    pub fn scheduler(&self) -> &HeartbeatScheduler {
        &self.scheduler
    }

    /// Mutable access to the wrapped scheduler.
    pub fn scheduler_mut(&mut self) -> &mut HeartbeatScheduler {
        &mut self.scheduler
    }

    /// Load the schedule and tick until `cancel` fires.
    pub fn run(mut self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let count = self.scheduler.load();
            info!("heartbeat runner started with {count} tasks");

            let mut interval = tokio::time::interval(self.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let report = self.tick_at(Local::now().naive_local()).await;
                        if !report.records.is_empty() {
                            debug!(
                                succeeded = report.succeeded().len(),
                                failed = report.failed().len(),
                                "heartbeat tick finished"
                            );
                        }
                    }
                }
            }

            info!("heartbeat runner stopped");
        })
    }

    /// Execute one tick against the reference time `now`.
    pub async fn tick_at(&mut self, now: NaiveDateTime) -> TickReport {
        let due = self.scheduler.due_tasks(now);
        let (parallel, mut serial) = HeartbeatScheduler::partition_parallel(due);
        let mut sequential = self.scheduler.sequential_tasks();
        serial.sort_by(|a, b| a.name.cmp(&b.name));
        sequential.sort_by(|a, b| a.name.cmp(&b.name));

        let mut report = TickReport::default();

        let mut set = JoinSet::new();
        for task in parallel {
            let executor = Arc::clone(&self.executor);
            set.spawn_blocking(move || {
                let result = execute(&executor, &task);
                (task, result)
            });
        }
        let mut finished = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(pair) => finished.push(pair),
                Err(e) => error!("parallel heartbeat task did not complete: {e}"),
            }
        }
        finished.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        for (task, result) in finished {
            self.complete(&mut report, RunPhase::Parallel, &task, result, now);
        }

        for (phase, tasks) in [(RunPhase::Serial, serial), (RunPhase::Sequential, sequential)] {
            for task in tasks {
                let result = self.execute_blocking(&task).await;
                self.complete(&mut report, phase, &task, result, now);
            }
        }

        report
    }

    async fn execute_blocking(&self, task: &ScheduledTask) -> TaskResult {
        let executor = Arc::clone(&self.executor);
        let owned = task.clone();
        match tokio::task::spawn_blocking(move || execute(&executor, &owned)).await {
            Ok(result) => result,
            Err(e) => TaskResult::Error(format!("task did not complete: {e}")),
        }
    }

    fn complete(
        &mut self,
        report: &mut TickReport,
        phase: RunPhase,
        task: &ScheduledTask,
        result: TaskResult,
        now: NaiveDateTime,
    ) {
        let outcome = match &result {
            TaskResult::Success(_) => {
                self.scheduler.mark_completed_at(&task.name, now);
                TaskRunOutcome::Success
            }
            TaskResult::Error(err) => {
                warn!(task = %task.name, "heartbeat task failed: {err}");
                TaskRunOutcome::Error
            }
        };

        let record = TaskRunRecord {
            name: task.name.clone(),
            phase,
            started_at: now,
            finished_at: Local::now().naive_local(),
            outcome,
            summary: result.summary(),
        };

        if let Some(tx) = &self.result_tx {
            if tx.send(record.clone()).is_err() {
                debug!("heartbeat result receiver dropped");
            }
        }
        report.records.push(record);
    }
}

/// Run the executor, converting a panic into a failed result.
fn execute(executor: &TaskExecutor, task: &ScheduledTask) -> TaskResult {
    debug!("executing heartbeat task: {}", task.name);
    match std::panic::catch_unwind(AssertUnwindSafe(|| executor(task))) {
        Ok(result) => result,
        Err(_) => TaskResult::Error(format!("executor panicked on task {}", task.name)),
    }
}
