use thiserror::Error;

use crate::db_types::{ConversionError, NewPaymentRecord, PaymentRecord, PaymentStatus, PaymentUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Database driver error: {0}")]
    DriverError(String),
    #[error("Payment record {0} does not exist")]
    NotFound(i64),
    #[error("Payment record {id} is no longer {expected}. It was modified concurrently")]
    StaleRecord { id: i64, expected: PaymentStatus },
    #[error("A payment with external transaction id {0} already exists")]
    DuplicateExternalId(String),
    #[error("Could not convert a stored value. {0}")]
    Conversion(String),
    #[error("The ledger did not respond to '{0}' in time")]
    Timeout(&'static str),
}

impl LedgerError {
    /// True when the write lost a race with another writer, and the caller should re-read and try again.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleRecord { .. } | Self::DuplicateExternalId(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        Self::DriverError(e.to_string())
    }
}

impl From<ConversionError> for LedgerError {
    fn from(e: ConversionError) -> Self {
        Self::Conversion(e.to_string())
    }
}

/// The durable payment ledger, as seen by the reconciliation orchestrator.
///
/// Records are never deleted through this interface.
#[allow(async_fn_in_trait)]
pub trait LedgerRepository {
    /// Fetches the record carrying the given processor transaction id.
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PaymentRecord>, LedgerError>;

    /// Fetches every record whose metadata `reference` equals `reference`, oldest first.
    ///
    /// This is a secondary, lower-confidence correlation path, used when the event that created a record did not
    /// carry the processor's transaction id. Several records can share a reference (e.g. retried payments for one
    /// order), so picking among them is left to the caller.
    async fn find_by_metadata_reference(&self, reference: &str) -> Result<Vec<PaymentRecord>, LedgerError>;

    /// Inserts a new record. If a record with the same external transaction id already exists, this fails with
    /// [`LedgerError::DuplicateExternalId`] and nothing is written.
    async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord, LedgerError>;

    /// Applies `update` to record `id`, but only if its status is still `expected`.
    ///
    /// Fails with [`LedgerError::StaleRecord`] if the status has changed since the caller read it, and with
    /// [`LedgerError::NotFound`] if the record does not exist.
    async fn update_conditional(
        &self,
        id: i64,
        expected: PaymentStatus,
        update: PaymentUpdate,
    ) -> Result<PaymentRecord, LedgerError>;
}
