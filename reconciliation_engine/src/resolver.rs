//! Correlates an inbound event with an existing ledger record.
//!
//! The processor's transaction id is the primary key. When it finds nothing, the resolver falls back to the
//! `reference` stored in record metadata. That path exists for records created by an event that did not carry the
//! transaction id, and it is lower-confidence: if both paths miss for an event that does belong to an existing
//! record, a second record is created, and the duplicate has to be merged by a later reconciliation sweep.
//!
//! A reference never overrides a transaction id. A record that already carries a different processor id belongs to
//! another transaction (a retried payment for the same order, say) and is not a match.
use log::*;

use crate::{
    db_types::PaymentRecord,
    extractor::ExtractedFields,
    traits::{LedgerError, LedgerRepository},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationPath {
    ExternalId,
    MetadataReference,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found { record: PaymentRecord, path: CorrelationPath },
    NotFound,
}

impl Resolution {
    pub fn record(&self) -> Option<&PaymentRecord> {
        match self {
            Resolution::Found { record, .. } => Some(record),
            Resolution::NotFound => None,
        }
    }
}

pub struct PaymentResolver<'a, L> {
    ledger: &'a L,
}

impl<'a, L: LedgerRepository> PaymentResolver<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    pub async fn resolve(&self, fields: &ExtractedFields) -> Result<Resolution, LedgerError> {
        if let Some(id) = &fields.transaction_id {
            if let Some(record) = self.ledger.find_by_external_id(id).await? {
                trace!("🔎️ Event for {id} matched payment #{} by external id", record.id);
                return Ok(Resolution::Found { record, path: CorrelationPath::ExternalId });
            }
        }
        // `reference` is also a transaction id alias, so an id equal to the reference says nothing new
        let transaction_id = fields.transaction_id.as_deref().filter(|id| fields.reference.as_deref() != Some(*id));
        // The reference first, then the transaction id, since a reference-only event may have stored what is in
        // fact the processor id under `reference`
        let candidates = fields.reference.as_deref().into_iter().chain(transaction_id);
        for reference in candidates {
            let matches = self.ledger.find_by_metadata_reference(reference).await?;
            if let Some(record) = matches.into_iter().find(|r| is_uncorrelated_or_same(r, transaction_id)) {
                info!(
                    "🔎️ Event for {} matched payment #{} by metadata reference '{reference}'. This is a \
                     lower-confidence match.",
                    fields.transaction_id.as_deref().unwrap_or("<no id>"),
                    record.id
                );
                return Ok(Resolution::Found { record, path: CorrelationPath::MetadataReference });
            }
        }
        Ok(Resolution::NotFound)
    }
}

/// A record whose stored id is just its own reference was never given a processor id, and counts as uncorrelated.
fn is_uncorrelated_or_same(record: &PaymentRecord, transaction_id: Option<&str>) -> bool {
    let stored = record.external_transaction_id.as_deref().filter(|id| record.reference() != Some(*id));
    match (stored, transaction_id) {
        (Some(stored), Some(id)) => stored == id,
        _ => true,
    }
}

#[cfg(test)]
mod test {
    use rec_common::CurrencyCode;
    use rust_decimal::Decimal;
    use serde_json::{json, Map, Value};

    use super::*;
    use crate::{
        db_types::{GatewayId, NewPaymentRecord, PaymentStatus, REFERENCE_KEY},
        extractor::FieldExtractor,
        test_utils::MemoryLedger,
    };

    fn record(external_id: Option<&str>, reference: Option<&str>) -> NewPaymentRecord {
        let mut metadata = Map::new();
        if let Some(r) = reference {
            metadata.insert(REFERENCE_KEY.into(), Value::String(r.into()));
        }
        NewPaymentRecord {
            external_transaction_id: external_id.map(String::from),
            external_charge_id: None,
            amount: Decimal::from(10),
            currency: CurrencyCode::default(),
            status: PaymentStatus::Pending,
            gateway: GatewayId::default(),
            description: None,
            client_email: None,
            client_name: None,
            metadata,
            failure_reason: None,
            processed_at: None,
            refunded_at: None,
        }
    }

    fn fields(payload: Value) -> ExtractedFields {
        FieldExtractor::default().extract(&payload).unwrap()
    }

    #[tokio::test]
    async fn external_id_wins() {
        let ledger = MemoryLedger::new();
        let by_ref = ledger.create(record(None, Some("tx_1"))).await.unwrap();
        let by_id = ledger.create(record(Some("tx_1"), None)).await.unwrap();
        assert_ne!(by_ref.id, by_id.id);
        let resolution = PaymentResolver::new(&ledger).resolve(&fields(json!({"id": "tx_1", "amount": 1}))).await.unwrap();
        assert_eq!(resolution, Resolution::Found { record: by_id, path: CorrelationPath::ExternalId });
    }

    #[tokio::test]
    async fn falls_back_to_the_metadata_reference() {
        let ledger = MemoryLedger::new();
        let stored = ledger.create(record(None, Some("ord-1"))).await.unwrap();
        let resolver = PaymentResolver::new(&ledger);
        let event = fields(json!({"id": "tx_1", "reference": "ord-1", "amount": 1}));
        let resolution = resolver.resolve(&event).await.unwrap();
        assert_eq!(resolution, Resolution::Found { record: stored.clone(), path: CorrelationPath::MetadataReference });
        // A reference-only record can also be matched by a later event's transaction id
        let ledger = MemoryLedger::new();
        let stored = ledger.create(record(None, Some("tx_2"))).await.unwrap();
        let event = fields(json!({"id": "tx_2", "amount": 1}));
        let resolution = PaymentResolver::new(&ledger).resolve(&event).await.unwrap();
        assert_eq!(resolution.record(), Some(&stored));
    }

    #[tokio::test]
    async fn a_reference_never_overrides_another_transaction_id() {
        let ledger = MemoryLedger::new();
        ledger.create(record(Some("tx_A"), Some("ord-1"))).await.unwrap();
        let retry = fields(json!({"id": "tx_B", "reference": "ord-1", "amount": 1}));
        let resolution = PaymentResolver::new(&ledger).resolve(&retry).await.unwrap();
        assert_eq!(resolution, Resolution::NotFound);
        // An uncorrelated record further down the list is still found
        let open = ledger.create(record(None, Some("ord-1"))).await.unwrap();
        let resolution = PaymentResolver::new(&ledger).resolve(&retry).await.unwrap();
        assert_eq!(resolution, Resolution::Found { record: open, path: CorrelationPath::MetadataReference });
    }

    #[tokio::test]
    async fn an_id_taken_from_the_reference_is_not_a_correlation() {
        let ledger = MemoryLedger::new();
        let stored = ledger.create(record(Some("ord-1"), Some("ord-1"))).await.unwrap();
        let event = fields(json!({"id": "tx_A", "reference": "ord-1", "amount": 1}));
        let resolution = PaymentResolver::new(&ledger).resolve(&event).await.unwrap();
        assert_eq!(resolution, Resolution::Found { record: stored, path: CorrelationPath::MetadataReference });
    }

    #[tokio::test]
    async fn reference_only_events_match_correlated_records() {
        let ledger = MemoryLedger::new();
        let stored = ledger.create(record(Some("tx_A"), Some("ord-1"))).await.unwrap();
        let event = fields(json!({"reference": "ord-1", "amount": 1}));
        let resolution = PaymentResolver::new(&ledger).resolve(&event).await.unwrap();
        assert_eq!(resolution, Resolution::Found { record: stored, path: CorrelationPath::MetadataReference });
    }

    #[tokio::test]
    async fn nothing_matches() {
        let ledger = MemoryLedger::new();
        ledger.create(record(Some("tx_1"), Some("ord-1"))).await.unwrap();
        let event = fields(json!({"id": "tx_9", "reference": "ord-9", "amount": 1}));
        let resolution = PaymentResolver::new(&ledger).resolve(&event).await.unwrap();
        assert_eq!(resolution, Resolution::NotFound);
        assert!(resolution.record().is_none());
    }
}
