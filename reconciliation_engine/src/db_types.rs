use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use rec_common::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::Type;
use thiserror::Error;

use crate::classifier::LifecycleIntent;

/// Metadata key under which every raw inbound payload for a record is preserved.
pub const RAW_PAYLOADS_KEY: &str = "raw_payloads";
/// Metadata key holding the secondary correlation reference.
pub const REFERENCE_KEY: &str = "reference";

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}")]
pub struct ConversionError(pub(crate) String);

//--------------------------------------   PaymentStatus     ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// The processor has announced the payment, but it has not settled.
    Pending,
    /// The payment settled. It can still be refunded.
    Succeeded,
    /// The payment failed. Terminal.
    Failed,
    /// The payment was refunded after succeeding. Terminal.
    Refunded,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Refunded)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Succeeded => write!(f, "Succeeded"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            PaymentStatus::Pending
        })
    }
}

//--------------------------------------      GatewayId       ---------------------------------------------------------
/// Identifies the processor that originated a payment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct GatewayId(pub String);

impl Default for GatewayId {
    fn default() -> Self {
        Self("default".to_string())
    }
}

impl From<&str> for GatewayId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for GatewayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------    PaymentRecord     ---------------------------------------------------------
/// A row in the payment ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i64,
    pub external_transaction_id: Option<String>,
    pub external_charge_id: Option<String>,
    /// Major currency units. Never negative.
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub status: PaymentStatus,
    pub gateway: GatewayId,
    pub description: Option<String>,
    pub client_email: Option<String>,
    pub client_name: Option<String>,
    pub metadata: Map<String, Value>,
    pub failure_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// The secondary correlation reference stored in the record metadata, if any.
    pub fn reference(&self) -> Option<&str> {
        self.metadata.get(REFERENCE_KEY).and_then(Value::as_str)
    }

    /// The raw payloads of every event applied to this record, oldest first.
    pub fn raw_payloads(&self) -> &[Value] {
        self.metadata.get(RAW_PAYLOADS_KEY).and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
    }
}

impl Display for PaymentRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ext_id = self.external_transaction_id.as_deref().unwrap_or("<no external id>");
        write!(f, "Payment #{} [{ext_id}] {} {} ({})", self.id, self.amount, self.currency, self.status)
    }
}

//--------------------------------------   NewPaymentRecord   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentRecord {
    pub external_transaction_id: Option<String>,
    pub external_charge_id: Option<String>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub status: PaymentStatus,
    pub gateway: GatewayId,
    pub description: Option<String>,
    pub client_email: Option<String>,
    pub client_name: Option<String>,
    pub metadata: Map<String, Value>,
    pub failure_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

//--------------------------------------    PaymentUpdate     ---------------------------------------------------------
/// A status transition for an existing record. `None` fields leave the stored value untouched, except `metadata`,
/// which always replaces the stored map with the already-merged map.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub external_transaction_id: Option<String>,
    pub external_charge_id: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<CurrencyCode>,
    pub description: Option<String>,
    pub client_email: Option<String>,
    pub client_name: Option<String>,
    pub metadata: Map<String, Value>,
    pub failure_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl PaymentUpdate {
    pub fn new(status: PaymentStatus, metadata: Map<String, Value>) -> Self {
        Self {
            status,
            external_transaction_id: None,
            external_charge_id: None,
            amount: None,
            currency: None,
            description: None,
            client_email: None,
            client_name: None,
            metadata,
            failure_reason: None,
            processed_at: None,
            refunded_at: None,
        }
    }

    /// Applies the update to an in-memory copy of a record.
    pub fn apply_to(&self, record: &mut PaymentRecord, now: DateTime<Utc>) {
        record.status = self.status;
        fn set<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if let Some(v) = value {
                *target = Some(v.clone());
            }
        }
        set(&mut record.external_transaction_id, &self.external_transaction_id);
        set(&mut record.external_charge_id, &self.external_charge_id);
        set(&mut record.description, &self.description);
        set(&mut record.client_email, &self.client_email);
        set(&mut record.client_name, &self.client_name);
        set(&mut record.failure_reason, &self.failure_reason);
        set(&mut record.processed_at, &self.processed_at);
        set(&mut record.refunded_at, &self.refunded_at);
        if let Some(amount) = self.amount {
            record.amount = amount;
        }
        if let Some(currency) = &self.currency {
            record.currency = currency.clone();
        }
        record.metadata = self.metadata.clone();
        record.updated_at = now;
    }
}

//--------------------------------------     OutcomeKind      ---------------------------------------------------------
/// The flat tag of a reconciliation decision, as stored in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OutcomeKind {
    Applied,
    NoOp,
    Rejected,
    Error,
}

impl Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Applied => write!(f, "Applied"),
            OutcomeKind::NoOp => write!(f, "NoOp"),
            OutcomeKind::Rejected => write!(f, "Rejected"),
            OutcomeKind::Error => write!(f, "Error"),
        }
    }
}

impl FromStr for OutcomeKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Applied" => Ok(Self::Applied),
            "NoOp" => Ok(Self::NoOp),
            "Rejected" => Ok(Self::Rejected),
            "Error" => Ok(Self::Error),
            s => Err(ConversionError(format!("outcome: {s}"))),
        }
    }
}

//--------------------------------------     AuditEntry       ---------------------------------------------------------
/// A single reconciliation decision. The audit log is the authoritative record of events that were received but
/// not applied, and is what a replay job works from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub received_at: DateTime<Utc>,
    pub intent: LifecycleIntent,
    pub raw_status: Option<String>,
    pub external_transaction_id: Option<String>,
    pub payment_id: Option<i64>,
    /// e.g. `Pending -> Succeeded`
    pub transition: Option<String>,
    pub outcome: OutcomeKind,
    pub detail: String,
    pub payload: Value,
}

impl NewAuditEntry {
    pub fn new(payload: Value, received_at: DateTime<Utc>) -> Self {
        Self {
            received_at,
            intent: LifecycleIntent::Unknown,
            raw_status: None,
            external_transaction_id: None,
            payment_id: None,
            transition: None,
            outcome: OutcomeKind::Error,
            detail: String::default(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub received_at: DateTime<Utc>,
    pub intent: LifecycleIntent,
    pub raw_status: Option<String>,
    pub external_transaction_id: Option<String>,
    pub payment_id: Option<i64>,
    pub transition: Option<String>,
    pub outcome: OutcomeKind,
    pub detail: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Succeeded.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Refunded.is_terminal());
    }

    #[test]
    fn status_strings() {
        for status in [PaymentStatus::Pending, PaymentStatus::Succeeded, PaymentStatus::Failed, PaymentStatus::Refunded]
        {
            assert_eq!(status.to_string().parse::<PaymentStatus>().unwrap(), status);
        }
        assert_eq!(PaymentStatus::from("garbage".to_string()), PaymentStatus::Pending);
    }
}
