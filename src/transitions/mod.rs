//! The transition contract and the built-in transitions.
//!
//! A transition is a named rule with a pure `filter` deciding whether it
//! applies to a change, and an `on_match` performing the side effect. The
//! pipeline guarantees it is applied at most once per document.

pub mod update_contact;
pub mod update_sent_forms;

use async_trait::async_trait;
use serde_json::Value;

use crate::document::Document;
use crate::error::Result;
use crate::pipeline::run_tracker::RunInfo;

pub use update_contact::UpdateContact;
pub use update_sent_forms::UpdateSentForms;

/// A document presented to the pipeline together with its run record.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub id: String,
    pub doc: Document,
    pub info: RunInfo,
}

impl Change {
    pub fn new(doc: Document) -> Self {
        let info = RunInfo::from_doc(&doc);
        let id = doc.id().unwrap_or_default().to_string();
        Self { id, doc, info }
    }
}

#[async_trait]
pub trait Transition: Send + Sync {
    /// Unique, stable name. Used as the key in run records.
    fn name(&self) -> &str;

    /// Validate configuration once at startup.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Whether this transition applies to `change`. Must not have side effects.
    fn filter(&self, change: &Change) -> Result<bool>;

    /// Apply the transition. `Ok(true)` when something changed, `Ok(false)`
    /// for a no-op. The document in `change` may be mutated; later
    /// transitions see the mutation.
    async fn on_match(&self, change: &mut Change) -> Result<bool>;
}

/// Decides whether a document is a well-formed form submission.
pub trait SubmissionCheck: Send + Sync {
    fn is_valid_submission(&self, doc: &Document) -> bool;
}

/// A submission has a form code and no recorded validation errors.
#[derive(Debug, Default)]
pub struct WellFormedSubmission;

impl SubmissionCheck for WellFormedSubmission {
    fn is_valid_submission(&self, doc: &Document) -> bool {
        let no_errors = match doc.get("errors") {
            None | Some(Value::Null) => true,
            Some(Value::Array(errors)) => errors.is_empty(),
            Some(_) => false,
        };
        doc.form().is_some() && no_errors
    }
}

/// JavaScript-style truthiness of an optional JSON value.
pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
