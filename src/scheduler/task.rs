use std::sync::Arc;

use async_trait::async_trait;
use chrono::Timelike;

use super::window::{Clock, ScheduleWindow};
use crate::audit::AuditSink;
use crate::config::ConfigProvider;
use crate::error::Result;
use crate::store::DocumentStore;

/// Collaborators handed to every task on every tick.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<dyn DocumentStore>,
    pub audit: Arc<dyn AuditSink>,
    pub config: Arc<dyn ConfigProvider>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// A windowed task invoked outside its sendable hours.
    OutsideWindow,
}

/// A unit of work run once per scheduler tick.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &TaskContext) -> Result<TaskOutcome>;
}

/// Runs the wrapped task only within the configured sendable hours.
///
/// The window is read from configuration on every run.
pub struct Windowed<T> {
    inner: T,
    clock: Arc<dyn Clock>,
}

impl<T: Task> Windowed<T> {
    pub fn new(inner: T, clock: Arc<dyn Clock>) -> Self {
        Self { inner, clock }
    }
}

#[async_trait]
impl<T: Task> Task for Windowed<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskOutcome> {
        let window = ScheduleWindow::from_config(ctx.config.as_ref());
        let hour = self.clock.now().hour();
        if !window.contains(hour) {
            tracing::debug!(
                task = self.name(),
                hour,
                after = window.after,
                until = window.until,
                "outside sendable window"
            );
            return Ok(TaskOutcome::OutsideWindow);
        }
        self.inner.run(ctx).await
    }
}
