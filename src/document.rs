//! JSON documents as stored by the document store, and dotted-path access
//! into them.
//!
//! Reports carry data-driven fields (`fields.vaccination_state`, ...) whose
//! names only exist in configuration, so [`FieldPath`] interprets a path of
//! object keys at runtime instead of mapping every form onto a struct.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document as persisted in the store: a JSON object keyed by `_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Build a document from a JSON value. Non-objects yield `None`.
    #[cfg(test)]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("_id")
    }

    pub fn rev(&self) -> Option<&str> {
        self.str_field("_rev")
    }

    pub fn set_rev(&mut self, rev: &str) {
        self.0.insert("_rev".into(), Value::String(rev.to_string()));
    }

    pub fn form(&self) -> Option<&str> {
        self.str_field("form").filter(|f| !f.is_empty())
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// A parsed dotted path such as `fields.vaccination_state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path. Empty paths and empty segments are rejected.
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self { segments })
    }

    /// Final key of the path; used as the field name on the target record.
    pub fn last_segment(&self) -> &str {
        // parse() never produces an empty path
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Single-segment path made of this path's last key.
    pub fn leaf(&self) -> FieldPath {
        FieldPath {
            segments: vec![self.last_segment().to_string()],
        }
    }

    /// Resolve the path against a JSON object.
    pub fn get<'a>(&self, root: &'a Map<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        rest.iter()
            .try_fold(root.get(first)?, |value, key| value.as_object()?.get(key))
    }

    /// Write `value` at the path, creating intermediate objects as needed.
    /// A non-object value in the way is replaced by an object.
    pub fn set(&self, root: &mut Map<String, Value>, value: Value) {
        let Some((last, parents)) = self.segments.split_last() else {
            return;
        };
        let mut cursor = root;
        for key in parents {
            let slot = cursor
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            cursor = match slot {
                Value::Object(map) => map,
                _ => return,
            };
        }
        cursor.insert(last.clone(), value);
    }

    /// Remove the value at the path, if present.
    pub fn remove(&self, root: &mut Map<String, Value>) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut cursor = root;
        for key in parents {
            cursor = cursor.get_mut(key)?.as_object_mut()?;
        }
        cursor.remove(last)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Reads a timestamp stored as epoch milliseconds or an RFC 3339 string.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc)),
        _ => None,
    }
}
