//! Scheduled tasks other than the transition pipeline.

pub mod due_tasks;

pub use due_tasks::DueTasks;
