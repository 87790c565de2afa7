use thiserror::Error;

use crate::{amount::AmountError, extractor::ExtractionError, traits::LedgerError};

/// Why an event could not be reconciled. This is the `Error` arm of a
/// [`ReconciliationOutcome`](crate::ReconciliationOutcome), and is never surfaced to the processor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    #[error("The request body is not valid JSON. {0}")]
    MalformedPayload(String),
    #[error("Malformed event. {0}")]
    Extraction(#[from] ExtractionError),
    #[error("Invalid amount. {0}")]
    Amount(#[from] AmountError),
    #[error("Ledger failure. {0}")]
    Ledger(#[from] LedgerError),
    #[error("The payment was modified concurrently on each of {attempts} attempts")]
    ConcurrentModification { attempts: usize },
}

impl ReconciliationError {
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedPayload(_) | Self::Extraction(_) | Self::Amount(_))
    }
}
