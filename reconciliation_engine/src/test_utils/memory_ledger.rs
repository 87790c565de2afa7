use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::Utc;
use serde_json::Value;

use crate::{
    db_types::{AuditEntry, NewAuditEntry, NewPaymentRecord, PaymentRecord, PaymentStatus, PaymentUpdate, REFERENCE_KEY},
    traits::{
        AuditError,
        AuditQueryFilter,
        AuditSink,
        LedgerError,
        LedgerRepository,
        PaymentQueries,
        PaymentQueryFilter,
    },
};

#[derive(Debug, Default)]
struct State {
    payments: Vec<PaymentRecord>,
    audit: Vec<AuditEntry>,
}

/// An in-memory ledger and audit log, with the same uniqueness and conditional-write rules as the SQLite backend.
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<State>>,
    latency: Option<Duration>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation sleeps for `latency` before touching the state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn payments(&self) -> Vec<PaymentRecord> {
        self.lock().payments.clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.lock().audit.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn clashes(payments: &[PaymentRecord], id: i64, external_id: Option<&String>) -> bool {
    external_id.is_some_and(|ext| {
        payments.iter().any(|p| p.id != id && p.external_transaction_id.as_ref() == Some(ext))
    })
}

impl LedgerRepository for MemoryLedger {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PaymentRecord>, LedgerError> {
        self.delay().await;
        let state = self.lock();
        Ok(state.payments.iter().find(|p| p.external_transaction_id.as_deref() == Some(external_id)).cloned())
    }

    async fn find_by_metadata_reference(&self, reference: &str) -> Result<Vec<PaymentRecord>, LedgerError> {
        self.delay().await;
        let state = self.lock();
        let found = state
            .payments
            .iter()
            .filter(|p| p.metadata.get(REFERENCE_KEY).and_then(Value::as_str) == Some(reference))
            .cloned()
            .collect();
        Ok(found)
    }

    async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord, LedgerError> {
        self.delay().await;
        let mut state = self.lock();
        if clashes(&state.payments, 0, record.external_transaction_id.as_ref()) {
            return Err(LedgerError::DuplicateExternalId(record.external_transaction_id.unwrap_or_default()));
        }
        let now = Utc::now();
        let payment = PaymentRecord {
            id: state.payments.len() as i64 + 1,
            external_transaction_id: record.external_transaction_id,
            external_charge_id: record.external_charge_id,
            amount: record.amount,
            currency: record.currency,
            status: record.status,
            gateway: record.gateway,
            description: record.description,
            client_email: record.client_email,
            client_name: record.client_name,
            metadata: record.metadata,
            failure_reason: record.failure_reason,
            processed_at: record.processed_at,
            refunded_at: record.refunded_at,
            created_at: now,
            updated_at: now,
        };
        state.payments.push(payment.clone());
        Ok(payment)
    }

    async fn update_conditional(
        &self,
        id: i64,
        expected: PaymentStatus,
        update: PaymentUpdate,
    ) -> Result<PaymentRecord, LedgerError> {
        self.delay().await;
        let mut state = self.lock();
        if clashes(&state.payments, id, update.external_transaction_id.as_ref()) {
            return Err(LedgerError::DuplicateExternalId(update.external_transaction_id.unwrap_or_default()));
        }
        let payment = state.payments.iter_mut().find(|p| p.id == id).ok_or(LedgerError::NotFound(id))?;
        if payment.status != expected {
            return Err(LedgerError::StaleRecord { id, expected });
        }
        update.apply_to(payment, Utc::now());
        Ok(payment.clone())
    }
}

impl PaymentQueries for MemoryLedger {
    async fn fetch_payment(&self, id: i64) -> Result<Option<PaymentRecord>, LedgerError> {
        self.delay().await;
        Ok(self.lock().payments.iter().find(|p| p.id == id).cloned())
    }

    async fn search_payments(&self, filter: PaymentQueryFilter) -> Result<Vec<PaymentRecord>, LedgerError> {
        self.delay().await;
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.page_size() as usize;
        let state = self.lock();
        Ok(state.payments.iter().filter(|p| filter.matches(p)).skip(offset).take(limit).cloned().collect())
    }
}

impl AuditSink for MemoryLedger {
    async fn record(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError> {
        self.delay().await;
        let mut state = self.lock();
        let entry = AuditEntry {
            id: state.audit.len() as i64 + 1,
            received_at: entry.received_at,
            intent: entry.intent,
            raw_status: entry.raw_status,
            external_transaction_id: entry.external_transaction_id,
            payment_id: entry.payment_id,
            transition: entry.transition,
            outcome: entry.outcome,
            detail: entry.detail,
            payload: entry.payload,
            created_at: Utc::now(),
        };
        state.audit.push(entry.clone());
        Ok(entry)
    }

    async fn fetch_entries(&self, filter: AuditQueryFilter) -> Result<Vec<AuditEntry>, AuditError> {
        self.delay().await;
        let limit = filter.page_size() as usize;
        let state = self.lock();
        Ok(state.audit.iter().rev().filter(|e| filter.matches(e)).take(limit).cloned().collect())
    }
}
