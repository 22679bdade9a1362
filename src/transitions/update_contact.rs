//! Copies a configured field from a submitted report onto the report's
//! patient contact.
//!
//! Configuration lives in the `update_contact` section:
//!
//! ```toml
//! [update_contact]
//! mark_contact_update_forms = ["vaccination"]
//! form_field_name = "fields.vaccination_state"
//! ```
//!
//! The value at `form_field_name` on the report is written onto the patient
//! under the path's last segment (`vaccination_state`).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{Change, SubmissionCheck, Transition, truthy};
use crate::config::{self, ConfigProvider};
use crate::document::{Document, FieldPath};
use crate::error::{Result, SentinelError};
use crate::store::DocumentStore;

pub const NAME: &str = "update_contact";
const CONFIG_NAME: &str = "update_contact";
const MARK_PROPERTY_NAME: &str = "mark_contact_update_forms";
const SOURCE_FORM_FIELD_NAME: &str = "form_field_name";

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    mark_contact_update_forms: Value,
    #[serde(default)]
    form_field_name: Value,
}

/// Settings for [`UpdateContact`]. Malformed entries are left empty here and
/// rejected by [`Transition::init`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateContactConfig {
    pub forms: Vec<String>,
    pub source_field: Option<FieldPath>,
}

impl UpdateContactConfig {
    pub fn from_provider(config: &dyn ConfigProvider) -> Result<Self> {
        let raw: RawConfig = config::section(config, CONFIG_NAME)?;

        let forms = match raw.mark_contact_update_forms {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        let source_field = raw.form_field_name.as_str().and_then(FieldPath::parse);

        Ok(Self {
            forms,
            source_field,
        })
    }

    fn is_confirm_form(&self, form: &str) -> bool {
        self.forms.iter().any(|f| f == form)
    }
}

pub struct UpdateContact {
    config: UpdateContactConfig,
    store: Arc<dyn DocumentStore>,
    submissions: Arc<dyn SubmissionCheck>,
}

impl UpdateContact {
    pub fn new(
        config: UpdateContactConfig,
        store: Arc<dyn DocumentStore>,
        submissions: Arc<dyn SubmissionCheck>,
    ) -> Self {
        Self {
            config,
            store,
            submissions,
        }
    }

    fn update_patient(&self, patient: &mut Document, report: &Document) {
        let Some(source) = &self.config.source_field else {
            return;
        };
        if !report.form().is_some_and(|f| self.config.is_confirm_form(f)) {
            return;
        }
        let target = source.leaf();
        match source.get(report.as_map()) {
            Some(value) => target.set(patient.as_map_mut(), value.clone()),
            None => {
                tracing::debug!(field = %source, "no value on report, clearing patient field");
                target.remove(patient.as_map_mut());
            }
        }
    }
}

#[async_trait]
impl Transition for UpdateContact {
    fn name(&self) -> &str {
        NAME
    }

    fn init(&self) -> Result<()> {
        if self.config.forms.is_empty() {
            return Err(SentinelError::Config(format!(
                "Config must have a '{CONFIG_NAME}.{MARK_PROPERTY_NAME}' array defined."
            )));
        }
        if self.config.source_field.is_none() {
            return Err(SentinelError::Config(format!(
                "Config must have a '{CONFIG_NAME}.{SOURCE_FORM_FIELD_NAME}' form field defined."
            )));
        }
        Ok(())
    }

    fn filter(&self, change: &Change) -> Result<bool> {
        let doc = &change.doc;
        Ok(doc.form().is_some()
            && doc.doc_type() == Some("data_record")
            && doc.form().is_some_and(|f| self.config.is_confirm_form(f))
            && truthy(doc.get("patient"))
            && !change.info.has_run(NAME)
            && self.submissions.is_valid_submission(doc))
    }

    async fn on_match(&self, change: &mut Change) -> Result<bool> {
        let patient_id = change
            .doc
            .get("patient")
            .and_then(|p| p.get("_id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let Some(patient_id) = patient_id else {
            return Ok(false);
        };

        // The hydrated copy may be stale; always update the stored contact.
        let mut patient = self.store.get(&patient_id).await?;
        self.update_patient(&mut patient, &change.doc);
        self.store.put(patient).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::config::Settings;
    use crate::error::StoreError;
    use crate::store::testing::RecordingStore;
    use serde_json::json;

    const VACCINATION: &str = "completed";

    /// Returns a fixed answer and records the documents it was asked about.
    struct StubSubmissions {
        answer: bool,
        seen: Mutex<Vec<Document>>,
    }

    impl StubSubmissions {
        fn returning(answer: bool) -> Arc<Self> {
            Arc::new(Self {
                answer,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<Document> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl SubmissionCheck for StubSubmissions {
        fn is_valid_submission(&self, doc: &Document) -> bool {
            self.seen.lock().unwrap().push(doc.clone());
            self.answer
        }
    }

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    fn vaccination_config(forms: &[&str]) -> UpdateContactConfig {
        let settings = Settings::from_value(json!({
            "update_contact": {
                "mark_contact_update_forms": forms,
                "form_field_name": "fields.vaccination_state"
            }
        }));
        UpdateContactConfig::from_provider(&settings).unwrap()
    }

    fn transition(
        config: UpdateContactConfig,
        store: Arc<RecordingStore>,
        submissions: Arc<StubSubmissions>,
    ) -> UpdateContact {
        UpdateContact::new(config, store, submissions)
    }

    mod on_match {
        use super::*;

        #[tokio::test]
        async fn saves_patient_state() {
            let patient = json!({"_id": "p1", "name": "greg"});
            let store = Arc::new(RecordingStore::with_docs([doc(patient.clone())]));
            let t = transition(
                vaccination_config(&["vaccination"]),
                store.clone(),
                StubSubmissions::returning(true),
            );
            let mut change = Change::new(doc(json!({
                "form": "vaccination",
                "type": "data_record",
                "fields": {"vaccination_state": VACCINATION},
                "patient": patient,
            })));

            let changed = t.on_match(&mut change).await.unwrap();

            assert!(changed);
            assert_eq!(store.gets(), ["p1"]);
            assert_eq!(
                store.puts(),
                [doc(json!({"_id": "p1", "name": "greg", "vaccination_state": VACCINATION}))]
            );
        }

        #[tokio::test]
        async fn uses_stored_patient_not_hydrated_copy() {
            let store = Arc::new(RecordingStore::with_docs([doc(json!({
                "name": "greg",
                "_id": "greg_uuid",
                "patient_id": "00001",
                "phone": "+123",
            }))]));
            let t = transition(
                vaccination_config(&["vaccination"]),
                store.clone(),
                StubSubmissions::returning(true),
            );
            let mut change = Change::new(doc(json!({
                "form": "vaccination",
                "fields": {"patient_uuid": "greg_uuid", "vaccination_state": VACCINATION},
                "patient": {"name": "greg", "_id": "greg_uuid", "patient_id": "00001"},
            })));

            assert!(t.on_match(&mut change).await.unwrap());
            assert_eq!(store.gets(), ["greg_uuid"]);
            assert_eq!(
                store.puts(),
                [doc(json!({
                    "name": "greg",
                    "_id": "greg_uuid",
                    "patient_id": "00001",
                    "phone": "+123",
                    "vaccination_state": VACCINATION,
                }))]
            );
        }

        #[tokio::test]
        async fn unhydrated_patient_is_a_no_op() {
            let store = Arc::new(RecordingStore::default());
            let t = transition(
                vaccination_config(&["vaccination"]),
                store.clone(),
                StubSubmissions::returning(true),
            );
            let mut change = Change::new(doc(json!({
                "form": "vaccination",
                "fields": {"patient_uuid": "00001", "vaccination_state": VACCINATION},
                "patient": {"empty": "????"},
            })));

            assert!(!t.on_match(&mut change).await.unwrap());
            assert!(store.gets().is_empty());
            assert!(store.puts().is_empty());
        }

        #[tokio::test]
        async fn missing_source_value_clears_target_field() {
            let store = Arc::new(RecordingStore::with_docs([doc(json!({
                "_id": "p1",
                "vaccination_state": "pending",
            }))]));
            let t = transition(
                vaccination_config(&["vaccination"]),
                store.clone(),
                StubSubmissions::returning(true),
            );
            let mut change = Change::new(doc(json!({
                "form": "vaccination",
                "fields": {},
                "patient": {"_id": "p1"},
            })));

            assert!(t.on_match(&mut change).await.unwrap());
            assert_eq!(store.puts(), [doc(json!({"_id": "p1"}))]);
        }

        #[tokio::test]
        async fn unknown_patient_fails() {
            let store = Arc::new(RecordingStore::default());
            let t = transition(
                vaccination_config(&["vaccination"]),
                store.clone(),
                StubSubmissions::returning(true),
            );
            let mut change = Change::new(doc(json!({
                "form": "vaccination",
                "patient": {"_id": "ghost"},
            })));

            let err = t.on_match(&mut change).await.unwrap_err();
            assert!(matches!(err, SentinelError::Store(StoreError::NotFound(_))));
            assert!(store.puts().is_empty());
        }

        #[tokio::test]
        async fn save_conflict_fails() {
            let store = Arc::new(
                RecordingStore::with_docs([doc(json!({"_id": "p1"}))]).failing_puts(|d| {
                    StoreError::Conflict {
                        id: d.id().unwrap_or_default().to_string(),
                        expected: None,
                        found: Some("2-x".into()),
                    }
                }),
            );
            let t = transition(
                vaccination_config(&["vaccination"]),
                store.clone(),
                StubSubmissions::returning(true),
            );
            let mut change = Change::new(doc(json!({
                "form": "vaccination",
                "fields": {"vaccination_state": VACCINATION},
                "patient": {"_id": "p1"},
            })));

            let err = t.on_match(&mut change).await.unwrap_err();
            assert!(matches!(err, SentinelError::Store(StoreError::Conflict { .. })));
        }
    }

    mod filter {
        use super::*;

        fn filter_with(config: UpdateContactConfig, submissions: Arc<StubSubmissions>, d: Value) -> bool {
            let t = transition(config, Arc::new(RecordingStore::default()), submissions);
            t.filter(&Change::new(doc(d))).unwrap()
        }

        #[test]
        fn empty_doc_returns_false() {
            let submissions = StubSubmissions::returning(true);
            assert!(!filter_with(UpdateContactConfig::default(), submissions, json!({})));
        }

        #[test]
        fn no_type_returns_false() {
            let config = vaccination_config(&["x", "y"]);
            assert!(!filter_with(
                config.clone(),
                StubSubmissions::returning(true),
                json!({"form": "x", "patient": {"_id": "p1"}})
            ));
            assert!(!filter_with(
                config,
                StubSubmissions::returning(true),
                json!({"from": "x"})
            ));
        }

        #[test]
        fn no_patient_returns_false() {
            assert!(!filter_with(
                vaccination_config(&["x", "y"]),
                StubSubmissions::returning(true),
                json!({"form": "x", "type": "data_record"})
            ));
        }

        #[test]
        fn unconfigured_form_returns_false() {
            assert!(!filter_with(
                vaccination_config(&["vaccination"]),
                StubSubmissions::returning(true),
                json!({"form": "other", "type": "data_record", "patient": {}})
            ));
        }

        #[test]
        fn already_run_returns_false() {
            let submissions = StubSubmissions::returning(true);
            assert!(!filter_with(
                vaccination_config(&["vaccination"]),
                submissions.clone(),
                json!({
                    "form": "vaccination",
                    "type": "data_record",
                    "patient": {},
                    "transitions": {
                        "update_contact": {"ok": true, "applied_at": "2024-01-01T00:00:00Z"}
                    }
                })
            ));
            assert!(submissions.seen().is_empty());
        }

        #[test]
        fn invalid_submission_returns_false() {
            let submissions = StubSubmissions::returning(false);
            let report = json!({
                "type": "data_record",
                "form": "vaccination",
                "fields": {},
                "patient": {}
            });
            assert!(!filter_with(
                vaccination_config(&["vaccination"]),
                submissions.clone(),
                report.clone()
            ));
            assert_eq!(submissions.seen(), [doc(report)]);
        }

        #[test]
        fn returns_true() {
            let submissions = StubSubmissions::returning(true);
            let config = vaccination_config(&["vaccination", "vaccination_followup"]);
            let t = transition(config, Arc::new(RecordingStore::default()), submissions.clone());

            for form in ["vaccination", "vaccination_followup"] {
                let change = Change::new(doc(json!({
                    "type": "data_record",
                    "form": form,
                    "fields": {"patient_id": "12", "vaccination_state": VACCINATION},
                    "patient": {"patient_id": "12"}
                })));
                assert!(t.filter(&change).unwrap());
            }
            assert_eq!(submissions.seen().len(), 2);
            assert_eq!(submissions.seen()[1].form(), Some("vaccination_followup"));
        }
    }

    mod init {
        use super::*;

        fn init_with(section: Value) -> Result<()> {
            let settings = Settings::from_value(json!({ "update_contact": section }));
            let config = UpdateContactConfig::from_provider(&settings)?;
            transition(
                config,
                Arc::new(RecordingStore::default()),
                StubSubmissions::returning(true),
            )
            .init()
        }

        #[test]
        fn valid_config_passes() {
            init_with(json!({
                "mark_contact_update_forms": ["vaccination"],
                "form_field_name": "fields.vaccination_state"
            }))
            .unwrap();
        }

        #[test]
        fn missing_forms_fails() {
            let err = init_with(json!({"form_field_name": "fields.vaccination_state"})).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Configuration error. Config must have a 'update_contact.mark_contact_update_forms' array defined."
            );
        }

        #[test]
        fn forms_not_an_array_fails() {
            let err = init_with(json!({
                "mark_contact_update_forms": "vaccination",
                "form_field_name": "fields.vaccination_state"
            }))
            .unwrap_err();
            assert!(matches!(err, SentinelError::Config(_)));
        }

        #[test]
        fn empty_forms_fails() {
            let err = init_with(json!({
                "mark_contact_update_forms": [],
                "form_field_name": "fields.vaccination_state"
            }))
            .unwrap_err();
            assert!(matches!(err, SentinelError::Config(_)));
        }

        #[test]
        fn missing_field_name_fails() {
            let err = init_with(json!({"mark_contact_update_forms": ["vaccination"]})).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Configuration error. Config must have a 'update_contact.form_field_name' form field defined."
            );
        }

        #[test]
        fn missing_section_fails() {
            let settings = Settings::default();
            let config = UpdateContactConfig::from_provider(&settings).unwrap();
            assert_eq!(config, UpdateContactConfig::default());
            assert!(
                transition(
                    config,
                    Arc::new(RecordingStore::default()),
                    StubSubmissions::returning(true)
                )
                .init()
                .is_err()
            );
        }
    }
}
