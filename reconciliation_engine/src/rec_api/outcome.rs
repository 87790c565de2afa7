use std::fmt::Display;

use crate::{
    db_types::{OutcomeKind, PaymentRecord, PaymentStatus},
    rec_api::errors::ReconciliationError,
    transitions::{NoOpReason, TransitionConflict},
};

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    /// The record as it was written
    pub payment: PaymentRecord,
    /// The status before the change. `None` for newly created records.
    pub from: Option<PaymentStatus>,
}

/// The result of reconciling one event. Whatever the variant, the processor gets the same acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    Applied(AppliedChange),
    NoOp(NoOpReason),
    Rejected(TransitionConflict),
    Error(ReconciliationError),
}

impl ReconciliationOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Applied(_) => OutcomeKind::Applied,
            Self::NoOp(_) => OutcomeKind::NoOp,
            Self::Rejected(_) => OutcomeKind::Rejected,
            Self::Error(_) => OutcomeKind::Error,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The written record, for applied outcomes.
    pub fn payment(&self) -> Option<&PaymentRecord> {
        match self {
            Self::Applied(change) => Some(&change.payment),
            _ => None,
        }
    }
}

impl Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied(AppliedChange { payment, from: None }) => write!(f, "Created {payment}"),
            Self::Applied(AppliedChange { payment, from: Some(from) }) => write!(f, "Updated {payment} from {from}"),
            Self::NoOp(reason) => write!(f, "No change. {reason}"),
            Self::Rejected(conflict) => write!(f, "Rejected. {conflict}"),
            Self::Error(e) => write!(f, "Error. {e}"),
        }
    }
}
