use chrono::{DateTime, Utc};
use reconciliation_engine::{
    classifier::LifecycleIntent,
    db_types::{OutcomeKind, PaymentStatus},
    traits::{AuditQueryFilter, PaymentQueryFilter},
};
use serde::{Deserialize, Serialize};

/// The body of every webhook response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

/// Query parameters for `GET /api/payments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentSearchParams {
    pub status: Option<PaymentStatus>,
    pub currency: Option<String>,
    pub external_id: Option<String>,
    pub email: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<PaymentSearchParams> for PaymentQueryFilter {
    fn from(params: PaymentSearchParams) -> Self {
        PaymentQueryFilter {
            status: params.status,
            currency: params.currency.map(|c| c.trim().to_ascii_uppercase()),
            external_id: params.external_id,
            client_email: params.email,
            since: params.since,
            until: params.until,
            limit: params.limit,
            offset: params.offset,
        }
    }
}

/// Query parameters for `GET /api/audit`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditLogParams {
    pub outcome: Option<OutcomeKind>,
    pub intent: Option<LifecycleIntent>,
    pub external_id: Option<String>,
    pub limit: Option<i64>,
}

impl From<AuditLogParams> for AuditQueryFilter {
    fn from(params: AuditLogParams) -> Self {
        AuditQueryFilter {
            outcome: params.outcome,
            intent: params.intent,
            external_id: params.external_id,
            limit: params.limit,
        }
    }
}
