//! Which transitions have already been applied to a document.
//!
//! The record lives on the document itself under the top-level
//! `transitions` key:
//!
//! ```json
//! { "transitions": { "update_contact": { "ok": true, "last_rev": "3-ab", "applied_at": "..." } } }
//! ```
//!
//! It is written in the same save that persists the rest of the document, so
//! it survives restarts together with the data it describes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;

pub const RUN_RECORD_FIELD: &str = "transitions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub ok: bool,
    /// Revision of the document the transition ran against.
    #[serde(default)]
    pub last_rev: Option<String>,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunInfo {
    transitions: BTreeMap<String, RunEntry>,
}

impl RunInfo {
    /// Read the run record from a document. A missing or unreadable record
    /// counts as "nothing has run".
    pub fn from_doc(doc: &Document) -> Self {
        let Some(raw) = doc.get(RUN_RECORD_FIELD) else {
            return Self::default();
        };
        match serde_json::from_value(raw.clone()) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(
                    doc_id = doc.id().unwrap_or("<none>"),
                    error = %e,
                    "ignoring malformed run record"
                );
                Self::default()
            }
        }
    }

    pub fn has_run(&self, transition: &str) -> bool {
        self.transitions.get(transition).is_some_and(|e| e.ok)
    }

    pub fn mark_run(&mut self, transition: &str, rev: Option<&str>) {
        self.transitions.insert(
            transition.to_string(),
            RunEntry {
                ok: true,
                last_rev: rev.map(str::to_string),
                applied_at: Utc::now(),
            },
        );
    }

    /// Embed the record in `doc`, replacing any previous one. Returns
    /// `true` when the replaced value was not a readable run record.
    pub fn write_to(&self, doc: &mut Document) -> Result<bool, serde_json::Error> {
        let unreadable = doc
            .get(RUN_RECORD_FIELD)
            .is_some_and(|raw| serde_json::from_value::<RunInfo>(raw.clone()).is_err());
        if unreadable {
            tracing::warn!(
                doc_id = doc.id().unwrap_or("<none>"),
                "overwriting unreadable run record"
            );
        }
        let value: Value = serde_json::to_value(self)?;
        doc.insert(RUN_RECORD_FIELD, value);
        Ok(unreadable)
    }
}
