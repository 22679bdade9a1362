//! Audit trail for applied and failed transitions.
//!
//! The sink is optional infrastructure: the pipeline logs a failing sink and
//! carries on, it never fails a transition because auditing did.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuditError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Applied,
    Failed,
}

/// Structured record of one transition outcome on one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub doc_id: String,
    pub transition: String,
    pub status: AuditStatus,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn applied(doc_id: &str, transition: &str) -> Self {
        Self::new(doc_id, transition, AuditStatus::Applied, None)
    }

    pub fn failed(doc_id: &str, transition: &str, detail: impl Into<String>) -> Self {
        Self::new(doc_id, transition, AuditStatus::Failed, Some(detail.into()))
    }

    fn new(doc_id: &str, transition: &str, status: AuditStatus, detail: Option<String>) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            transition: transition.to_string(),
            status,
            detail,
            recorded_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Writes audit entries to the log as JSON under the `audit` target.
#[derive(Debug, Default)]
pub struct LogAudit;

#[async_trait]
impl AuditSink for LogAudit {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let json = serde_json::to_string(&entry).map_err(|e| AuditError::Unavailable(e.to_string()))?;
        tracing::info!(target: "audit", "{json}");
        Ok(())
    }
}
