//! Keeps, on each clinic contact, the date of the latest report received for
//! every form code (`sent_forms.<form>`).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde_json::{Map, Value};

use super::{Change, Transition, truthy};
use crate::document::parse_timestamp;
use crate::error::{Result, SentinelError};
use crate::store::DocumentStore;

pub const NAME: &str = "update_sent_forms";

pub struct UpdateSentForms {
    store: Arc<dyn DocumentStore>,
}

impl UpdateSentForms {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

fn clinic_id(change: &Change) -> Option<String> {
    change
        .doc
        .get("related_entities")?
        .get("clinic")?
        .get("_id")?
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Transition for UpdateSentForms {
    fn name(&self) -> &str {
        NAME
    }

    fn filter(&self, change: &Change) -> Result<bool> {
        let doc = &change.doc;
        Ok(doc.form().is_some() && truthy(doc.get("reported_date")) && clinic_id(change).is_some())
    }

    async fn on_match(&self, change: &mut Change) -> Result<bool> {
        let (Some(form), Some(id)) = (change.doc.form(), clinic_id(change)) else {
            return Ok(false);
        };
        let reported = change
            .doc
            .get("reported_date")
            .and_then(parse_timestamp)
            .ok_or_else(|| SentinelError::transition(NAME, "unreadable reported_date"))?;

        let mut clinic = self.store.get(&id).await?;
        let sent_forms = clinic
            .as_map_mut()
            .entry("sent_forms")
            .or_insert_with(|| Value::Object(Map::new()));
        if !sent_forms.is_object() {
            *sent_forms = Value::Object(Map::new());
        }
        if let Value::Object(sent_forms) = sent_forms {
            let latest = sent_forms.get(form).and_then(parse_timestamp);
            if latest.is_none_or(|latest| latest < reported) {
                sent_forms.insert(
                    form.to_string(),
                    Value::String(reported.to_rfc3339_opts(SecondsFormat::Millis, true)),
                );
            }
        }

        self.store.put(clinic).await?;
        Ok(true)
    }
}
