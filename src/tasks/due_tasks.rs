//! Moves scheduled messages whose due date has passed to `pending`, so the
//! outbound side picks them up. Registered behind the sendable window.
//!
//! Documents carry their messages in a `scheduled_tasks` array:
//!
//! ```json
//! { "scheduled_tasks": [ { "due": "2024-03-01T09:00:00Z", "state": "scheduled" } ] }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::document::{Document, parse_timestamp};
use crate::error::{Result, SentinelError};
use crate::scheduler::{Clock, Task, TaskContext, TaskOutcome};
use crate::store::DocumentStore;

pub const NAME: &str = "due_tasks";

/// Due dates are compared against the same clock that gates the window.
pub struct DueTasks {
    clock: Arc<dyn Clock>,
}

/// Flip due entries of `doc` to pending. Returns how many changed.
fn mark_due(doc: &mut Document, now: DateTime<Utc>) -> usize {
    let Some(Value::Array(tasks)) = doc.as_map_mut().get_mut("scheduled_tasks") else {
        return 0;
    };
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut changed = 0;

    for task in tasks.iter_mut().filter_map(Value::as_object_mut) {
        let scheduled = task.get("state").and_then(Value::as_str) == Some("scheduled");
        let due = task.get("due").and_then(parse_timestamp);
        if !scheduled || due.is_none_or(|due| due > now) {
            continue;
        }
        task.insert("state".into(), json!("pending"));
        task.insert("timestamp".into(), json!(timestamp));
        match task
            .entry("state_history")
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(history) => history.push(json!({
                "state": "pending",
                "timestamp": timestamp,
            })),
            other => {
                *other = json!([{ "state": "pending", "timestamp": timestamp }]);
            }
        }
        changed += 1;
    }
    changed
}

impl DueTasks {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Mark every due message in the store as pending, as of `now`.
    pub async fn run_at(&self, store: &dyn DocumentStore, now: DateTime<Utc>) -> Result<usize> {
        let mut marked = 0;
        let mut save_failures = 0;

        for mut doc in store.all_docs().await? {
            let changed = mark_due(&mut doc, now);
            if changed == 0 {
                continue;
            }
            match store.put(doc).await {
                Ok(_) => marked += changed,
                Err(e) => {
                    save_failures += 1;
                    tracing::warn!(error = %e, "could not save due messages");
                }
            }
        }

        tracing::info!(marked, "due messages set to pending");
        if save_failures > 0 {
            return Err(SentinelError::Task {
                task: NAME.to_string(),
                message: format!("{save_failures} document(s) could not be saved"),
            });
        }
        Ok(marked)
    }
}

#[async_trait]
impl Task for DueTasks {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskOutcome> {
        self.run_at(ctx.store.as_ref(), self.clock.now_utc()).await?;
        Ok(TaskOutcome::Completed)
    }
}
