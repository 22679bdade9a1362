use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one transition against one document revision.
///
/// Every pair starts in `NotEvaluated` and makes exactly one move:
/// NOT_EVALUATED → SKIPPED | NOT_APPLICABLE | APPLIED | FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairState {
    NotEvaluated,
    Skipped,
    NotApplicable,
    Applied,
    Failed,
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairState::NotEvaluated => write!(f, "NOT_EVALUATED"),
            PairState::Skipped => write!(f, "SKIPPED"),
            PairState::NotApplicable => write!(f, "NOT_APPLICABLE"),
            PairState::Applied => write!(f, "APPLIED"),
            PairState::Failed => write!(f, "FAILED"),
        }
    }
}

/// What happened when the pipeline evaluated a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The run record already lists this transition.
    AlreadyRun,
    /// `filter` returned false.
    FilterRejected,
    /// `filter` errored; treated as not applicable.
    FilterErrored(String),
    /// `on_match` ran and reported nothing changed.
    NoOp,
    /// `on_match` ran and changed something.
    Applied,
    /// `on_match` errored.
    Failed(String),
}

impl PairState {
    /// The state a pair reaches when evaluation produced `step`.
    pub fn after(step: &Step) -> PairState {
        match step {
            Step::AlreadyRun => PairState::Skipped,
            Step::FilterRejected | Step::FilterErrored(_) | Step::NoOp => {
                PairState::NotApplicable
            }
            Step::Applied => PairState::Applied,
            Step::Failed(_) => PairState::Failed,
        }
    }

    /// `Applied` and `Skipped` are final for the document revision; the
    /// others are evaluated again on the next tick.
    pub fn is_final(self) -> bool {
        matches!(self, PairState::Applied | PairState::Skipped)
    }
}

/// Outcome of one transition on one change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub transition: String,
    pub state: PairState,
    pub step: Step,
}

/// Every transition's outcome for one change event, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub doc_id: String,
    pub results: Vec<TransitionResult>,
}

impl ChangeReport {
    pub fn count(&self, state: PairState) -> usize {
        self.results.iter().filter(|r| r.state == state).count()
    }

    /// State of `transition`; `NotEvaluated` if it is not part of the report.
    pub fn state_of(&self, transition: &str) -> PairState {
        self.results
            .iter()
            .find(|r| r.transition == transition)
            .map_or(PairState::NotEvaluated, |r| r.state)
    }

    pub fn any_applied(&self) -> bool {
        self.count(PairState::Applied) > 0
    }
}
