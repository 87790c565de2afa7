use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db_types::{PaymentRecord, PaymentStatus};

/// Published once, when a payment first reaches `Succeeded`. Carries the updated ledger record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSucceededEvent {
    pub payment: PaymentRecord,
    /// `None` when the payment was created directly in the `Succeeded` state
    pub previous_status: Option<PaymentStatus>,
}

impl PaymentSucceededEvent {
    pub fn new(payment: PaymentRecord, previous_status: Option<PaymentStatus>) -> Self {
        Self { payment, previous_status }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub payment: PaymentRecord,
    pub reason: Option<String>,
}

impl PaymentFailedEvent {
    pub fn new(payment: PaymentRecord) -> Self {
        let reason = payment.failure_reason.clone();
        Self { payment, reason }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRefundedEvent {
    pub payment: PaymentRecord,
    pub refund_amount: Decimal,
    pub refunded_at: DateTime<Utc>,
}

impl PaymentRefundedEvent {
    pub fn new(payment: PaymentRecord, refund_amount: Decimal) -> Self {
        let refunded_at = payment.refunded_at.unwrap_or(payment.updated_at);
        Self { payment, refund_amount, refunded_at }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    PaymentSucceeded(PaymentSucceededEvent),
    PaymentFailed(PaymentFailedEvent),
    PaymentRefunded(PaymentRefundedEvent),
}
