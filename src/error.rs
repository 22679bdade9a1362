use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("Configuration error. {0}")]
    Config(String),

    #[error("Transition {transition} failed: {message}")]
    Transition { transition: String, message: String },

    #[error("Task {task} failed: {message}")]
    Task { task: String, message: String },

    #[error("{count} task(s) failed this tick: {names}")]
    Tick { count: usize, names: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SentinelError {
    pub fn transition(name: &str, message: impl Into<String>) -> Self {
        SentinelError::Transition {
            transition: name.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised at the document store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    /// The stored revision moved on since the document was read.
    #[error("document update conflict: {id} (expected rev {expected:?}, found {found:?})")]
    Conflict {
        id: String,
        expected: Option<String>,
        found: Option<String>,
    },

    #[error("document has no _id")]
    MissingId,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T, E = SentinelError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = SentinelError::Config(
            "Config must have a 'update_contact.form_field_name' form field defined.".into(),
        );
        assert_eq!(
            err.to_string(),
            "Configuration error. Config must have a 'update_contact.form_field_name' form field defined."
        );
    }

    #[test]
    fn conflict_display_includes_revisions() {
        let err = StoreError::Conflict {
            id: "p1".into(),
            expected: Some("1-a".into()),
            found: Some("2-b".into()),
        };
        assert_eq!(
            err.to_string(),
            r#"document update conflict: p1 (expected rev Some("1-a"), found Some("2-b"))"#
        );
    }

    #[test]
    fn store_error_converts() {
        let err: SentinelError = StoreError::NotFound("p1".into()).into();
        assert!(matches!(err, SentinelError::Store(StoreError::NotFound(_))));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SentinelError>();
    }
}
