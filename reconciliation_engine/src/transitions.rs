//! The payment state machine.
//!
//! ```text
//!   NotFound --Created--> Pending --Succeeded--> Succeeded --Refunded--> Refunded
//!      |                     |                       ^
//!      +------Succeeded------|-----------------------+
//!                            +--Failed--> Failed
//! ```
//!
//! [`TransitionEngine::next`] is a pure function of the current ledger state (or its absence) and the classified
//! event. It never touches storage. Every (state, intent) pair maps to exactly one [`Transition`]:
//!
//! | Current          | Intent    | Result                                                        |
//! |------------------|-----------|---------------------------------------------------------------|
//! | *                | Unknown   | `NoOp(UnknownIntent)`                                         |
//! | NotFound         | Created   | `Create` in `Pending`                                         |
//! | NotFound         | Succeeded | `Create` in `Succeeded` with `processed_at` and the charge id |
//! | NotFound         | Failed    | `NoOp(NothingToReconcile)`                                    |
//! | NotFound         | Refunded  | `NoOp(NothingToReconcile)`                                    |
//! | Pending          | Created   | `NoOp(Duplicate)`                                             |
//! | Pending          | Succeeded | `Update` to `Succeeded`                                       |
//! | Pending          | Failed    | `Update` to `Failed`                                          |
//! | Pending          | Refunded  | `Rejected`                                                    |
//! | Succeeded        | Created   | `Rejected`                                                    |
//! | Succeeded        | Succeeded | `NoOp(Duplicate)`                                             |
//! | Succeeded        | Failed    | `Rejected`                                                    |
//! | Succeeded        | Refunded  | `Update` to `Refunded`                                        |
//! | Failed, Refunded | *         | `NoOp(TerminalState)`                                         |
use std::fmt::Display;

use chrono::{DateTime, Utc};
use rec_common::CurrencyCode;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    classifier::{Classification, LifecycleIntent},
    db_types::{GatewayId, NewPaymentRecord, PaymentRecord, PaymentStatus, PaymentUpdate, RAW_PAYLOADS_KEY, REFERENCE_KEY},
    extractor::ExtractedFields,
};

pub const LAST_EVENT_TYPE_KEY: &str = "last_event_type";
pub const REFUND_AMOUNT_KEY: &str = "refund_amount";
pub const REFUND_ID_KEY: &str = "refund_id";
pub const FAILURE_CODE_KEY: &str = "failure_code";

/// Everything the state machine needs to know about one inbound event, after extraction, normalization and
/// classification.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub fields: ExtractedFields,
    pub classification: Classification,
    /// Major units
    pub amount: Decimal,
    /// Major units
    pub refund_amount: Option<Decimal>,
    pub currency: CurrencyCode,
    pub gateway: GatewayId,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl EventContext {
    pub fn intent(&self) -> LifecycleIntent {
        self.classification.intent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionConflict {
    pub current: PaymentStatus,
    pub intent: LifecycleIntent,
}

impl Display for TransitionConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Illegal transition: a {} payment cannot become {}", self.current, self.intent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NoOpReason {
    /// The event could not be classified. The raw classification input is kept for synonym maintenance.
    UnknownIntent(Option<String>),
    /// A failure or refund for a payment the ledger has never seen
    NothingToReconcile(LifecycleIntent),
    /// The ledger is already in the state this event describes
    Duplicate(PaymentStatus),
    /// The payment is in a terminal state
    TerminalState { current: PaymentStatus, intent: LifecycleIntent },
}

impl Display for NoOpReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownIntent(Some(raw)) => write!(f, "Unrecognised event type '{raw}'"),
            Self::UnknownIntent(None) => write!(f, "The event carries no status or type"),
            Self::NothingToReconcile(intent) => write!(f, "No payment exists to mark as {intent}"),
            Self::Duplicate(status) => write!(f, "The payment is already {status}"),
            Self::TerminalState { current, intent } => {
                write!(f, "Ignoring {intent} event. The payment is {current}, which is terminal")
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Create(NewPaymentRecord),
    Update { id: i64, expected: PaymentStatus, update: PaymentUpdate },
    NoOp(NoOpReason),
    Rejected(TransitionConflict),
}

impl Transition {
    /// A short `from -> to` description for logs and the audit trail.
    pub fn describe(&self, current: Option<&PaymentRecord>) -> Option<String> {
        let from = current.map(|r| r.status.to_string()).unwrap_or_else(|| "NotFound".to_string());
        match self {
            Transition::Create(record) => Some(format!("{from} -> {}", record.status)),
            Transition::Update { update, .. } => Some(format!("{from} -> {}", update.status)),
            Transition::NoOp(_) => None,
            Transition::Rejected(c) => Some(format!("{from} -> {} (rejected)", c.intent)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionEngine;

impl TransitionEngine {
    pub fn next(&self, current: Option<&PaymentRecord>, ctx: &EventContext) -> Transition {
        use LifecycleIntent as I;
        use PaymentStatus as S;

        let intent = ctx.intent();
        let unknown = || Transition::NoOp(NoOpReason::UnknownIntent(ctx.classification.raw.clone()));
        let Some(record) = current else {
            return match intent {
                I::Unknown => unknown(),
                I::Created => Transition::Create(new_record(S::Pending, ctx)),
                I::Succeeded => Transition::Create(new_record(S::Succeeded, ctx)),
                I::Failed | I::Refunded => Transition::NoOp(NoOpReason::NothingToReconcile(intent)),
            };
        };
        let current = record.status;
        let update = |status| Transition::Update { id: record.id, expected: current, update: status };
        match (current, intent) {
            (_, I::Unknown) => unknown(),
            (S::Failed | S::Refunded, _) => Transition::NoOp(NoOpReason::TerminalState { current, intent }),
            (S::Pending, I::Created) | (S::Succeeded, I::Succeeded) => Transition::NoOp(NoOpReason::Duplicate(current)),
            (S::Pending, I::Succeeded) => update(succeeded_update(record, ctx)),
            (S::Pending, I::Failed) => update(failed_update(record, ctx)),
            (S::Succeeded, I::Refunded) => update(refunded_update(record, ctx)),
            (S::Succeeded, I::Created) | (S::Pending, I::Refunded) | (S::Succeeded, I::Failed) => {
                Transition::Rejected(TransitionConflict { current, intent })
            },
        }
    }
}

fn new_record(status: PaymentStatus, ctx: &EventContext) -> NewPaymentRecord {
    let succeeded = status == PaymentStatus::Succeeded;
    let f = &ctx.fields;
    NewPaymentRecord {
        external_transaction_id: f.transaction_id.clone(),
        external_charge_id: f.charge_id.clone().filter(|_| succeeded),
        amount: ctx.amount,
        currency: ctx.currency.clone(),
        status,
        gateway: ctx.gateway.clone(),
        description: f.description.clone(),
        client_email: f.customer_email.clone(),
        client_name: f.customer_name.clone(),
        metadata: merge_metadata(None, ctx),
        failure_reason: None,
        processed_at: succeeded.then_some(ctx.received_at),
        refunded_at: None,
    }
}

/// Customer details carried by the event replace the stored values. The external id is only ever backfilled.
fn base_update(status: PaymentStatus, record: &PaymentRecord, ctx: &EventContext) -> PaymentUpdate {
    let f = &ctx.fields;
    let mut update = PaymentUpdate::new(status, merge_metadata(Some(&record.metadata), ctx));
    if record.external_transaction_id.is_none() {
        update.external_transaction_id = f.transaction_id.clone();
    }
    update.description = f.description.clone();
    update.client_email = f.customer_email.clone();
    update.client_name = f.customer_name.clone();
    update
}

fn succeeded_update(record: &PaymentRecord, ctx: &EventContext) -> PaymentUpdate {
    let mut update = base_update(PaymentStatus::Succeeded, record, ctx);
    update.external_charge_id = ctx.fields.charge_id.clone();
    update.amount = Some(ctx.amount);
    update.currency = Some(ctx.currency.clone());
    update.processed_at = Some(ctx.received_at);
    update
}

fn failed_update(record: &PaymentRecord, ctx: &EventContext) -> PaymentUpdate {
    let mut update = base_update(PaymentStatus::Failed, record, ctx);
    let f = &ctx.fields;
    update.failure_reason = f
        .failure_reason
        .clone()
        .or_else(|| f.failure_code.clone())
        .or_else(|| ctx.classification.raw.as_ref().map(|raw| format!("Processor reported '{raw}'")));
    update
}

fn refunded_update(record: &PaymentRecord, ctx: &EventContext) -> PaymentUpdate {
    let mut update = base_update(PaymentStatus::Refunded, record, ctx);
    let refund_amount = ctx.refund_amount.unwrap_or(record.amount);
    update.metadata.insert(REFUND_AMOUNT_KEY.into(), Value::String(refund_amount.to_string()));
    update.refunded_at = Some(ctx.received_at);
    update
}

/// Merges the event's extra fields into the existing metadata. Keys are added or overwritten, and the raw payload is
/// appended to the `raw_payloads` trail, which is never replaced.
pub fn merge_metadata(existing: Option<&Map<String, Value>>, ctx: &EventContext) -> Map<String, Value> {
    let mut metadata = existing.cloned().unwrap_or_default();
    let f = &ctx.fields;
    for (key, value) in &f.extra {
        if key != RAW_PAYLOADS_KEY {
            metadata.insert(key.clone(), value.clone());
        }
    }
    let mut set = |key: &str, value: &Option<String>| {
        if let Some(v) = value {
            metadata.insert(key.to_string(), Value::String(v.clone()));
        }
    };
    set(REFERENCE_KEY, &f.reference);
    set(REFUND_ID_KEY, &f.refund_id);
    set(FAILURE_CODE_KEY, &f.failure_code);
    set(LAST_EVENT_TYPE_KEY, &ctx.classification.raw);
    let trail = metadata.entry(RAW_PAYLOADS_KEY).or_insert_with(|| Value::Array(vec![]));
    match trail {
        Value::Array(payloads) => payloads.push(ctx.payload.clone()),
        other => {
            // Someone else's data lives under our key. Keep it as the first element of the trail.
            let previous = other.take();
            *other = Value::Array(vec![previous, ctx.payload.clone()]);
        },
    }
    metadata
}
