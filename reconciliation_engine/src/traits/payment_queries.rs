use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{PaymentRecord, PaymentStatus},
    traits::LedgerError,
};

pub const DEFAULT_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentQueryFilter {
    pub status: Option<PaymentStatus>,
    pub currency: Option<String>,
    pub external_id: Option<String>,
    pub client_email: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaymentQueryFilter {
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_external_id<S: Into<String>>(mut self, external_id: S) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_client_email<S: Into<String>>(mut self, email: S) -> Self {
        self.client_email = Some(email.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// True if no filter criteria (paging aside) are set.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() &&
            self.currency.is_none() &&
            self.external_id.is_none() &&
            self.client_email.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }

    pub fn page_size(&self) -> i64 {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Checks a record against the filter criteria. Paging is not considered.
    pub fn matches(&self, record: &PaymentRecord) -> bool {
        self.status.map(|s| s == record.status).unwrap_or(true) &&
            self.currency.as_ref().map(|c| c.eq_ignore_ascii_case(record.currency.as_str())).unwrap_or(true) &&
            self.external_id.as_ref().map(|id| record.external_transaction_id.as_ref() == Some(id)).unwrap_or(true) &&
            self.client_email.as_ref().map(|e| record.client_email.as_ref() == Some(e)).unwrap_or(true) &&
            self.since.map(|t| record.created_at >= t).unwrap_or(true) &&
            self.until.map(|t| record.created_at <= t).unwrap_or(true)
    }
}

impl Display for PaymentQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters. ")?;
        }
        if let Some(status) = &self.status {
            write!(f, "status: {status}. ")?;
        }
        if let Some(currency) = &self.currency {
            write!(f, "currency: {currency}. ")?;
        }
        if let Some(id) = &self.external_id {
            write!(f, "external_id: {id}. ")?;
        }
        if let Some(email) = &self.client_email {
            write!(f, "email: {email}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        write!(f, "limit {}, offset {}", self.page_size(), self.offset.unwrap_or(0))
    }
}

/// Read access to the ledger for collaborators outside the reconciliation flow.
#[allow(async_fn_in_trait)]
pub trait PaymentQueries {
    async fn fetch_payment(&self, id: i64) -> Result<Option<PaymentRecord>, LedgerError>;

    /// Fetches the payments matching the filter, oldest first.
    async fn search_payments(&self, filter: PaymentQueryFilter) -> Result<Vec<PaymentRecord>, LedgerError>;
}
