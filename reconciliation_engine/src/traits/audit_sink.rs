use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    classifier::LifecycleIntent,
    db_types::{AuditEntry, NewAuditEntry, OutcomeKind},
    traits::payment_queries::DEFAULT_PAGE_SIZE,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    #[error("Could not write to the audit log: {0}")]
    WriteFailed(String),
    #[error("Could not read the audit log: {0}")]
    ReadFailed(String),
    #[error("The audit log did not respond in time")]
    Timeout,
}

impl From<sqlx::Error> for AuditError {
    fn from(e: sqlx::Error) -> Self {
        Self::WriteFailed(e.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQueryFilter {
    pub outcome: Option<OutcomeKind>,
    pub intent: Option<LifecycleIntent>,
    pub external_id: Option<String>,
    pub limit: Option<i64>,
}

impl AuditQueryFilter {
    pub fn with_outcome(mut self, outcome: OutcomeKind) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_intent(mut self, intent: LifecycleIntent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_external_id<S: Into<String>>(mut self, external_id: S) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn page_size(&self) -> i64 {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.outcome.map(|o| o == entry.outcome).unwrap_or(true) &&
            self.intent.map(|i| i == entry.intent).unwrap_or(true) &&
            self.external_id.as_ref().map(|id| entry.external_transaction_id.as_ref() == Some(id)).unwrap_or(true)
    }
}

/// Receives every reconciliation decision. The audit log is the authoritative record of events that were
/// acknowledged but not applied.
#[allow(async_fn_in_trait)]
pub trait AuditSink {
    async fn record(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError>;

    /// Fetches the most recent entries matching the filter, newest first.
    async fn fetch_entries(&self, filter: AuditQueryFilter) -> Result<Vec<AuditEntry>, AuditError>;
}
