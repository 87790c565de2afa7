//! Field extraction from loosely-typed processor payloads.
//!
//! Processors (and different versions of the same processor) name the same piece of information differently. Every
//! field the engine needs is therefore resolved through an ordered alias list ([`FieldAliases`]), and extraction is a
//! single pass over those lists. Nothing here interprets the values: amounts are returned exactly as sent (the unit
//! is resolved by the [`crate::amount`] module) and status strings are handed to the [`crate::classifier`] as-is.
mod aliases;

use std::str::FromStr;

pub use aliases::{FieldAliases, DEFAULT_ALIASES, STATUS_FIELDS};
use log::*;
use rec_common::helpers::non_blank;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("The event payload is not a JSON object")]
    NotAnObject,
    #[error("The event payload does not contain an amount")]
    MissingAmount,
    #[error("The value '{value}' in field '{field}' is not a valid amount")]
    InvalidAmount { field: &'static str, value: String },
    #[error("The event payload contains neither a transaction identifier nor a reference")]
    MissingIdentifier,
}

/// The raw status/type strings of an event. See [`crate::classifier::classify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusFields {
    pub event_type: Option<String>,
    /// The `type` field
    pub kind: Option<String>,
    pub event: Option<String>,
    pub status: Option<String>,
}

impl StatusFields {
    /// The first non-blank status field, along with the name of the field it came from.
    pub fn classification_input(&self) -> Option<(&'static str, &str)> {
        [&self.event_type, &self.kind, &self.event, &self.status]
            .into_iter()
            .zip(STATUS_FIELDS)
            .find_map(|(value, name)| value.as_deref().and_then(non_blank).map(|v| (name, v)))
    }
}

/// Everything the engine reads from an event payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedFields {
    pub transaction_id: Option<String>,
    pub reference: Option<String>,
    /// The amount as sent. Its unit is not known yet.
    pub raw_amount: Decimal,
    /// The unit the payload declares for its amounts, if any
    pub amount_unit: Option<String>,
    pub currency: Option<String>,
    pub status: StatusFields,
    pub charge_id: Option<String>,
    pub refund_id: Option<String>,
    pub raw_refund_amount: Option<Decimal>,
    pub failure_reason: Option<String>,
    pub failure_code: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub description: Option<String>,
    /// The payload's own metadata object, if it has one
    pub extra: Map<String, Value>,
}

impl ExtractedFields {
    /// The key used to correlate this event with a ledger record: the transaction id, or failing that, the reference.
    pub fn correlation_key(&self) -> Option<&str> {
        self.transaction_id.as_deref().or(self.reference.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    aliases: FieldAliases,
}

impl FieldExtractor {
    pub fn new(aliases: FieldAliases) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &FieldAliases {
        &self.aliases
    }

    /// Reads only the status fields. Unlike [`Self::extract`], this never fails, so that events can be classified
    /// even when they lack the fields a ledger write would need.
    pub fn extract_status(&self, payload: &Value) -> StatusFields {
        let [event_type, kind, event, status] = STATUS_FIELDS.map(|field| first_string(payload, &[field]));
        StatusFields { event_type, kind, event, status }
    }

    pub fn extract(&self, payload: &Value) -> Result<ExtractedFields, ExtractionError> {
        if !payload.is_object() {
            return Err(ExtractionError::NotAnObject);
        }
        let a = &self.aliases;
        let raw_amount = first_decimal(payload, a.amount)?.ok_or(ExtractionError::MissingAmount)?;
        let transaction_id = first_string(payload, a.transaction_id);
        let reference = first_string(payload, a.reference);
        if transaction_id.is_none() && reference.is_none() {
            return Err(ExtractionError::MissingIdentifier);
        }
        let status = self.extract_status(payload);
        let extra = a
            .metadata
            .iter()
            .find_map(|path| lookup(payload, path).and_then(Value::as_object))
            .cloned()
            .unwrap_or_default();
        let fields = ExtractedFields {
            transaction_id,
            reference,
            raw_amount,
            amount_unit: first_string(payload, a.amount_unit),
            currency: first_string(payload, a.currency),
            status,
            charge_id: first_string(payload, a.charge_id),
            refund_id: first_string(payload, a.refund_id),
            raw_refund_amount: first_decimal(payload, a.refund_amount)?,
            failure_reason: first_string(payload, a.failure_reason),
            failure_code: first_string(payload, a.failure_code),
            customer_name: first_string(payload, a.customer_name),
            customer_email: first_string(payload, a.customer_email),
            description: first_string(payload, a.description),
            extra,
        };
        trace!("🧾️ Extracted fields: {fields:?}");
        Ok(fields)
    }
}

/// Resolves a dotted path against the payload.
pub fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(payload, |value, segment| value.get(segment))
}

/// Strings are trimmed, and numbers are converted to their textual representation. Everything else is treated as
/// absent.
fn as_non_empty_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s).map(String::from),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_string(payload: &Value, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|path| lookup(payload, path).and_then(as_non_empty_string))
}

/// The first alias with a non-empty value is parsed as an exact decimal. A present but unparseable value is an error,
/// rather than a reason to try the next alias.
fn first_decimal(payload: &Value, aliases: &'static [&'static str]) -> Result<Option<Decimal>, ExtractionError> {
    let found = aliases.iter().find_map(|path| lookup(payload, path).and_then(as_non_empty_string).map(|v| (*path, v)));
    let Some((field, value)) = found else {
        return Ok(None);
    };
    parse_decimal(&value).map(Some).ok_or(ExtractionError::InvalidAmount { field, value })
}

pub(crate) fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value).or_else(|_| Decimal::from_scientific(value)).ok()
}

#[cfg(test)]
mod test {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    fn extract(payload: Value) -> Result<ExtractedFields, ExtractionError> {
        FieldExtractor::default().extract(&payload)
    }

    #[test]
    fn payment_id_has_priority_over_id() {
        let fields = extract(json!({"id": "evt_1", "payment_id": "pay_1", "amount": 100})).unwrap();
        assert_eq!(fields.transaction_id.as_deref(), Some("pay_1"));
        let fields = extract(json!({"id": "evt_1", "amount": 100})).unwrap();
        assert_eq!(fields.transaction_id.as_deref(), Some("evt_1"));
    }

    #[test]
    fn blank_values_fall_through_to_the_next_alias() {
        let fields = extract(json!({"payment_id": "  ", "transaction_id": "tx_9", "amount": 100})).unwrap();
        assert_eq!(fields.transaction_id.as_deref(), Some("tx_9"));
    }

    #[test]
    fn numeric_identifiers_are_stringified() {
        let fields = extract(json!({"id": 12345, "amount": 100})).unwrap();
        assert_eq!(fields.transaction_id.as_deref(), Some("12345"));
    }

    #[test]
    fn nested_envelope() {
        let payload = json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": "pi_1",
                "amount": 2000,
                "currency": "eur",
                "latest_charge": "ch_1",
                "metadata": { "reference": "order-7", "customer_email": "alice@example.com" }
            }}
        });
        let fields = extract(payload).unwrap();
        // the root id is the event id here, which still wins by priority
        assert_eq!(fields.transaction_id.as_deref(), Some("evt_1"));
        assert_eq!(fields.raw_amount, Decimal::from(2000));
        assert_eq!(fields.currency.as_deref(), Some("eur"));
        assert_eq!(fields.charge_id.as_deref(), Some("ch_1"));
        assert_eq!(fields.reference.as_deref(), Some("order-7"));
        assert_eq!(fields.status.kind.as_deref(), Some("payment_intent.succeeded"));
        assert_eq!(fields.extra.get("customer_email"), Some(&json!("alice@example.com")));
    }

    #[test]
    fn amounts_are_exact() {
        let fields = extract(json!({"id": "tx", "amount": "150.10"})).unwrap();
        assert_eq!(fields.raw_amount.to_string(), "150.10");
        let fields = extract(json!({"id": "tx", "amount": 0.1})).unwrap();
        assert_eq!(fields.raw_amount.to_string(), "0.1");
        let fields = extract(json!({"id": "tx", "amount": "1e3"})).unwrap();
        assert_eq!(fields.raw_amount, Decimal::from(1000));
    }

    #[test]
    fn missing_or_invalid_amount() {
        assert_eq!(extract(json!({"id": "tx"})).unwrap_err(), ExtractionError::MissingAmount);
        assert_eq!(extract(json!({"id": "tx", "amount": "  "})).unwrap_err(), ExtractionError::MissingAmount);
        assert_eq!(
            extract(json!({"id": "tx", "amount": "ten dollars"})).unwrap_err(),
            ExtractionError::InvalidAmount { field: "amount", value: "ten dollars".into() }
        );
    }

    #[test]
    fn identifier_or_reference_is_required() {
        assert_eq!(extract(json!({"amount": 10})).unwrap_err(), ExtractionError::MissingIdentifier);
        let fields = extract(json!({"merchant_reference": "ord-1", "amount": 10})).unwrap();
        assert!(fields.transaction_id.is_none());
        assert_eq!(fields.correlation_key(), Some("ord-1"));
    }

    #[test]
    fn payload_must_be_an_object() {
        assert_eq!(extract(json!([1, 2, 3])).unwrap_err(), ExtractionError::NotAnObject);
        assert_eq!(extract(json!("paid")).unwrap_err(), ExtractionError::NotAnObject);
    }

    #[test]
    fn customer_details_and_failures() {
        let payload = json!({
            "id": "tx",
            "amount": 10,
            "status": "failed",
            "customer": { "name": "Bob", "email": "bob@example.com" },
            "last_payment_error": { "code": "card_declined", "message": "Your card was declined." },
            "refund": { "id": "re_1", "amount": 500 }
        });
        let fields = extract(payload).unwrap();
        assert_eq!(fields.customer_name.as_deref(), Some("Bob"));
        assert_eq!(fields.customer_email.as_deref(), Some("bob@example.com"));
        assert_eq!(fields.failure_code.as_deref(), Some("card_declined"));
        assert_eq!(fields.failure_reason.as_deref(), Some("Your card was declined."));
        assert_eq!(fields.refund_id.as_deref(), Some("re_1"));
        assert_eq!(fields.raw_refund_amount, Some(Decimal::from(500)));
        assert_eq!(fields.status.classification_input(), Some(("status", "failed")));
    }

    #[test]
    fn non_string_status_values_are_ignored() {
        let fields = extract(json!({"id": "tx", "amount": 1, "event": {"name": "x"}, "status": "paid"})).unwrap();
        assert_eq!(fields.status.classification_input(), Some(("status", "paid")));
    }

    #[test]
    fn custom_aliases() {
        let aliases = FieldAliases { transaction_id: &["txn.ref"], ..DEFAULT_ALIASES };
        let extractor = FieldExtractor::new(aliases);
        let fields = extractor.extract(&json!({"id": "ignored", "txn": {"ref": "T-1"}, "amount": 1})).unwrap();
        assert_eq!(fields.transaction_id.as_deref(), Some("T-1"));
    }
}
