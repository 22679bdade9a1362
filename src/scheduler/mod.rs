//! Runs the registered tasks once per tick, strictly one after another, then
//! sleeps until the next five-minute wall-clock boundary.
//!
//! A failing task is logged and the series continues; the failures of a tick
//! are logged once more together after the series. Nothing a task does can
//! stop the loop from rescheduling.

mod task;
mod window;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::SentinelError;

pub use task::{Task, TaskContext, TaskOutcome, Windowed};
pub use window::{Clock, SystemClock, humanize, next_tick_delay};

#[cfg(test)]
pub(crate) use task::testing as task_testing;
#[cfg(test)]
pub(crate) use window::testing as window_testing;

#[derive(Debug)]
pub enum TaskStatus {
    Completed,
    OutsideWindow,
    Failed(SentinelError),
}

#[derive(Debug)]
pub struct TaskRun {
    pub task: String,
    pub status: TaskStatus,
    pub elapsed: Duration,
}

/// Result of one pass over every task.
#[derive(Debug, Default)]
pub struct TickReport {
    pub runs: Vec<TaskRun>,
}

impl TickReport {
    pub fn failures(&self) -> impl Iterator<Item = &TaskRun> {
        self.runs
            .iter()
            .filter(|r| matches!(r.status, TaskStatus::Failed(_)))
    }

    /// The tick's aggregate error, if any task failed.
    pub fn error(&self) -> Option<SentinelError> {
        let names: Vec<&str> = self.failures().map(|r| r.task.as_str()).collect();
        if names.is_empty() {
            return None;
        }
        Some(SentinelError::Tick {
            count: names.len(),
            names: names.join(", "),
        })
    }
}

pub struct Scheduler {
    tasks: Vec<Arc<dyn Task>>,
    ctx: TaskContext,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(tasks: Vec<Arc<dyn Task>>, ctx: TaskContext, clock: Arc<dyn Clock>) -> Self {
        Self { tasks, ctx, clock }
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Run every task once, in registration order.
    pub async fn run_tick(&self) -> TickReport {
        let mut report = TickReport::default();

        for task in &self.tasks {
            let started = Instant::now();
            let status = match task.run(&self.ctx).await {
                Ok(TaskOutcome::Completed) => TaskStatus::Completed,
                Ok(TaskOutcome::OutsideWindow) => TaskStatus::OutsideWindow,
                Err(e) => {
                    tracing::error!(task = task.name(), error = %e, "task failed");
                    TaskStatus::Failed(e)
                }
            };
            report.runs.push(TaskRun {
                task: task.name().to_string(),
                status,
                elapsed: started.elapsed(),
            });
        }

        if let Some(e) = report.error() {
            tracing::error!(error = %e, "Error running tasks");
        }
        report
    }

    /// Spawn the scheduling loop. The first tick runs immediately.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move { self.run_loop(shutdown_rx).await });
        SchedulerHandle {
            shutdown: shutdown_tx,
            join,
        }
    }

    async fn run_loop(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(tasks = ?self.task_names(), "scheduler started");
        loop {
            self.run_tick().await;

            if *shutdown.borrow() {
                break;
            }
            let delay = next_tick_delay(self.clock.now());
            tracing::info!("checking schedule again in {}", humanize(delay));

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("scheduler stopped");
    }
}

/// Owns the running loop. Stopping never interrupts a tick in progress.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal shutdown and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "scheduler loop panicked");
        }
    }
}
