//! Applies the registered transitions, in order, to every document.
//!
//! Per change event each transition is skipped if its run record says it has
//! already been applied, otherwise filtered and, when it matches, applied.
//! Errors from one transition never stop the others. Applied transitions are
//! recorded on the change immediately and persisted with the document in a
//! single save once every transition has had its turn.

pub mod run_tracker;
mod state;

use std::sync::Arc;

use async_trait::async_trait;

use crate::audit::{AuditEntry, AuditSink};
use crate::error::{Result, SentinelError, StoreError};
use crate::scheduler::{Task, TaskContext, TaskOutcome};
use crate::store::DocumentStore;
use crate::transitions::{Change, Transition};

pub use state::{ChangeReport, PairState, Step, TransitionResult};

pub const TASK_NAME: &str = "transitions";

/// Totals for one scan of the document collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub documents: usize,
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Pairs left open, evaluated again next tick.
    pub pending: usize,
    pub save_failures: usize,
}

impl ScanSummary {
    fn add(&mut self, report: &ChangeReport) {
        self.documents += 1;
        self.applied += report.count(PairState::Applied);
        self.failed += report.count(PairState::Failed);
        self.skipped += report.count(PairState::Skipped);
        self.pending += report
            .results
            .iter()
            .filter(|r| !r.state.is_final())
            .count();
    }
}

pub struct TransitionPipeline {
    transitions: Vec<Arc<dyn Transition>>,
    audit: Arc<dyn AuditSink>,
}

impl TransitionPipeline {
    pub fn new(transitions: Vec<Arc<dyn Transition>>, audit: Arc<dyn AuditSink>) -> Self {
        Self { transitions, audit }
    }

    pub fn names(&self) -> Vec<&str> {
        self.transitions.iter().map(|t| t.name()).collect()
    }

    /// Run every transition against one change event, in registration order.
    pub async fn apply(&self, change: &mut Change) -> ChangeReport {
        let mut results = Vec::with_capacity(self.transitions.len());

        for transition in &self.transitions {
            let name = transition.name();
            let step = self.evaluate(transition.as_ref(), change).await;
            let state = PairState::after(&step);

            match &step {
                Step::Applied => {
                    let rev = change.doc.rev().map(str::to_string);
                    change.info.mark_run(name, rev.as_deref());
                    self.audit(AuditEntry::applied(&change.id, name)).await;
                }
                Step::Failed(reason) => {
                    self.audit(AuditEntry::failed(&change.id, name, reason.as_str()))
                        .await;
                }
                _ => {}
            }

            results.push(TransitionResult {
                transition: name.to_string(),
                state,
                step,
            });
        }

        ChangeReport {
            doc_id: change.id.clone(),
            results,
        }
    }

    async fn evaluate(&self, transition: &dyn Transition, change: &mut Change) -> Step {
        let name = transition.name();

        if change.info.has_run(name) {
            tracing::trace!(doc_id = %change.id, transition = name, "already run");
            return Step::AlreadyRun;
        }

        match transition.filter(change) {
            Ok(true) => {}
            Ok(false) => return Step::FilterRejected,
            Err(e) => {
                tracing::warn!(
                    doc_id = %change.id,
                    transition = name,
                    error = %e,
                    "filter failed, treating as not applicable"
                );
                return Step::FilterErrored(e.to_string());
            }
        }

        match transition.on_match(change).await {
            Ok(true) => {
                tracing::info!(doc_id = %change.id, transition = name, "transition applied");
                Step::Applied
            }
            Ok(false) => {
                tracing::debug!(doc_id = %change.id, transition = name, "transition was a no-op");
                Step::NoOp
            }
            Err(e) => {
                tracing::error!(doc_id = %change.id, transition = name, error = %e, "transition failed");
                Step::Failed(e.to_string())
            }
        }
    }

    async fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(error = %e, "could not write audit entry");
        }
    }

    /// Evaluate every document in the store once.
    ///
    /// Fails only if the collection cannot be listed. Each document is
    /// re-read just before evaluation so that writes made by earlier
    /// documents' transitions are seen.
    pub async fn scan(&self, store: &dyn DocumentStore) -> Result<ScanSummary> {
        let ids: Vec<String> = store
            .all_docs()
            .await?
            .iter()
            .filter_map(|d| d.id().map(str::to_string))
            .collect();

        let mut summary = ScanSummary::default();
        for id in ids {
            let doc = match store.get(&id).await {
                Ok(doc) => doc,
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => {
                    tracing::warn!(doc_id = %id, error = %e, "could not read document");
                    continue;
                }
            };

            let mut change = Change::new(doc);
            let report = self.apply(&mut change).await;
            summary.add(&report);
            for name in self.names() {
                tracing::trace!(
                    doc_id = %id,
                    transition = name,
                    state = %report.state_of(name),
                    "pair evaluated"
                );
            }

            if report.any_applied() {
                if let Err(e) = self.persist(store, change).await {
                    summary.save_failures += 1;
                    tracing::warn!(doc_id = %id, error = %e, "could not save run record");
                }
            }
        }

        Ok(summary)
    }

    async fn persist(&self, store: &dyn DocumentStore, mut change: Change) -> Result<()> {
        change.info.write_to(&mut change.doc)?;
        store.put(change.doc).await?;
        Ok(())
    }
}

#[async_trait]
impl Task for TransitionPipeline {
    fn name(&self) -> &str {
        TASK_NAME
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskOutcome> {
        let summary = self.scan(ctx.store.as_ref()).await.map_err(|e| SentinelError::Task {
            task: TASK_NAME.to_string(),
            message: e.to_string(),
        })?;
        tracing::info!(
            documents = summary.documents,
            applied = summary.applied,
            failed = summary.failed,
            skipped = summary.skipped,
            pending = summary.pending,
            save_failures = summary.save_failures,
            "transition scan finished"
        );
        Ok(TaskOutcome::Completed)
    }
}
