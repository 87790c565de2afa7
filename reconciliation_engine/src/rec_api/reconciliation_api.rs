use std::{fmt::Debug, future::Future, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use rec_common::CurrencyCode;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::time::timeout;

use crate::{
    amount::AmountNormalizer,
    classifier::{classify, Classification, LifecycleIntent},
    db_types::{NewAuditEntry, PaymentStatus},
    events::{EventProducers, EventType, PaymentFailedEvent, PaymentRefundedEvent, PaymentSucceededEvent},
    extractor::{ExtractedFields, FieldExtractor},
    rec_api::{
        config::ReconcilerConfig,
        errors::ReconciliationError,
        outcome::{AppliedChange, ReconciliationOutcome},
    },
    resolver::PaymentResolver,
    traits::{AuditSink, LedgerError, LedgerRepository},
    transitions::{EventContext, NoOpReason, Transition, TransitionEngine, REFUND_AMOUNT_KEY},
};

/// `ReconciliationApi` is the orchestrator. It takes one processor event at a time through extraction,
/// normalization, classification, correlation and the state machine, writes the result to the ledger, and records
/// the decision in the audit log.
///
/// It is safe to call concurrently, including for the same transaction. Lost races are detected by the ledger's
/// conditional writes and retried once. Nothing is ever returned to the caller except a [`ReconciliationOutcome`]:
/// every failure is contained, logged and audited.
pub struct ReconciliationApi<L, A> {
    ledger: L,
    audit: A,
    producers: EventProducers,
    config: ReconcilerConfig,
    extractor: FieldExtractor,
    normalizer: AmountNormalizer,
    engine: TransitionEngine,
}

impl<L, A> Debug for ReconciliationApi<L, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.config)
    }
}

impl<L, A> ReconciliationApi<L, A> {
    pub fn new(ledger: L, audit: A, producers: EventProducers, config: ReconcilerConfig) -> Self {
        let extractor = FieldExtractor::new(config.aliases.clone());
        let normalizer = AmountNormalizer::new(config.amount_policy);
        Self { ledger, audit, producers, config, extractor, normalizer, engine: TransitionEngine }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

impl<L, A> ReconciliationApi<L, A>
where
    L: LedgerRepository,
    A: AuditSink,
{
    /// Reconciles an event straight from the request body. A body that is not JSON is recorded as malformed.
    pub async fn process_raw_event(&self, body: &[u8]) -> ReconciliationOutcome {
        match serde_json::from_slice::<Value>(body) {
            Ok(payload) => self.process_event(payload).await,
            Err(e) => {
                let received_at = Utc::now();
                let payload = Value::String(String::from_utf8_lossy(body).into_owned());
                let mut entry = NewAuditEntry::new(payload, received_at);
                let outcome = ReconciliationOutcome::Error(ReconciliationError::MalformedPayload(e.to_string()));
                warn!("🧾️ Received a webhook body that is not JSON. {e}");
                self.finish(outcome, &mut entry, None).await
            },
        }
    }

    /// Reconciles a single event against the ledger.
    pub async fn process_event(&self, payload: Value) -> ReconciliationOutcome {
        let received_at = Utc::now();
        debug!("🧾️ Reconciling event: {payload}");
        let mut entry = NewAuditEntry::new(payload.clone(), received_at);
        let classification = classify(&self.extractor.extract_status(&payload));
        entry.intent = classification.intent;
        entry.raw_status = classification.raw.clone();
        if classification.intent == LifecycleIntent::Unknown {
            // Unknown events are not required to look like payments, so nothing else is extracted
            entry.external_transaction_id = self.extractor.extract(&payload).ok().and_then(|f| f.transaction_id);
            let outcome = ReconciliationOutcome::NoOp(NoOpReason::UnknownIntent(classification.raw));
            return self.finish(outcome, &mut entry, None).await;
        }
        let ctx = match self.build_context(payload, classification, received_at) {
            Ok(ctx) => ctx,
            Err(e) => return self.finish(ReconciliationOutcome::Error(e), &mut entry, None).await,
        };
        entry.external_transaction_id = ctx.fields.correlation_key().map(String::from);
        let outcome = match self.reconcile(&ctx, &mut entry).await {
            Ok(outcome) => outcome,
            Err(e) => ReconciliationOutcome::Error(e),
        };
        if let ReconciliationOutcome::Applied(change) = &outcome {
            self.publish(change, &ctx).await;
        }
        self.finish(outcome, &mut entry, Some(&ctx.fields)).await
    }

    fn build_context(
        &self,
        payload: Value,
        classification: Classification,
        received_at: DateTime<Utc>,
    ) -> Result<EventContext, ReconciliationError> {
        let fields = self.extractor.extract(&payload)?;
        // A refund is in the same unit as the payment amount next to it, however small it is
        let unit = self.normalizer.unit_for(fields.raw_amount, fields.amount_unit.as_deref());
        let amount = self.normalizer.normalize_as(fields.raw_amount, unit)?;
        let refund_amount = fields.raw_refund_amount.map(|raw| self.normalizer.normalize_as(raw, unit)).transpose()?;
        let currency = match fields.currency.as_deref().map(CurrencyCode::from_str) {
            Some(Ok(code)) => code,
            Some(Err(e)) => {
                warn!("🧾️ {e}. Using the default currency, {}", self.config.default_currency);
                self.config.default_currency.clone()
            },
            None => self.config.default_currency.clone(),
        };
        Ok(EventContext {
            fields,
            classification,
            amount,
            refund_amount,
            currency,
            gateway: self.config.gateway.clone(),
            payload,
            received_at,
        })
    }

    /// Resolve, compute the transition and write it. A write that loses a race re-resolves and tries again.
    async fn reconcile(
        &self,
        ctx: &EventContext,
        entry: &mut NewAuditEntry,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let resolver = PaymentResolver::new(&self.ledger);
        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            let resolution = bounded(self.config.ledger_timeout, "find", resolver.resolve(&ctx.fields)).await?;
            let current = resolution.record();
            let transition = self.engine.next(current, ctx);
            entry.payment_id = current.map(|r| r.id);
            entry.transition = transition.describe(current);
            let written = match transition {
                Transition::NoOp(reason) => return Ok(ReconciliationOutcome::NoOp(reason)),
                Transition::Rejected(conflict) => return Ok(ReconciliationOutcome::Rejected(conflict)),
                Transition::Create(record) => bounded(self.config.ledger_timeout, "create", self.ledger.create(record))
                    .await
                    .map(|payment| AppliedChange { payment, from: None }),
                Transition::Update { id, expected, update } => bounded(
                    self.config.ledger_timeout,
                    "update",
                    self.ledger.update_conditional(id, expected, update),
                )
                .await
                .map(|payment| AppliedChange { payment, from: Some(expected) }),
            };
            match written {
                Ok(change) => {
                    entry.payment_id = Some(change.payment.id);
                    return Ok(ReconciliationOutcome::Applied(change));
                },
                Err(e) if e.is_stale() => {
                    warn!("🧾️ Lost a race on attempt {attempt}/{attempts}. {e}. Re-resolving.");
                },
                Err(e) => return Err(e.into()),
            }
        }
        Err(ReconciliationError::ConcurrentModification { attempts })
    }

    /// Notifies hook subscribers. Only applied changes get here, so a re-delivered event never notifies twice.
    async fn publish(&self, change: &AppliedChange, ctx: &EventContext) {
        let payment = change.payment.clone();
        let event = match payment.status {
            PaymentStatus::Pending => return,
            PaymentStatus::Succeeded => EventType::PaymentSucceeded(PaymentSucceededEvent::new(payment, change.from)),
            PaymentStatus::Failed => EventType::PaymentFailed(PaymentFailedEvent::new(payment)),
            PaymentStatus::Refunded => {
                let amount = payment
                    .metadata
                    .get(REFUND_AMOUNT_KEY)
                    .and_then(Value::as_str)
                    .and_then(|s| Decimal::from_str(s).ok())
                    .or(ctx.refund_amount)
                    .unwrap_or(payment.amount);
                EventType::PaymentRefunded(PaymentRefundedEvent::new(payment, amount))
            },
        };
        trace!("🧾️ Publishing {event:?}");
        self.producers.publish(event).await;
    }

    /// Logs the decision and writes it to the audit log.
    async fn finish(
        &self,
        outcome: ReconciliationOutcome,
        entry: &mut NewAuditEntry,
        fields: Option<&ExtractedFields>,
    ) -> ReconciliationOutcome {
        entry.outcome = outcome.kind();
        entry.detail = outcome.to_string();
        let id = entry.external_transaction_id.as_deref().unwrap_or("<unknown>");
        let transition = entry.transition.as_deref().unwrap_or("none");
        match &outcome {
            ReconciliationOutcome::Applied(_) => info!("🧾️ [{id}] {} ({transition})", entry.detail),
            ReconciliationOutcome::NoOp(NoOpReason::UnknownIntent(_)) => {
                warn!("🧾️ [{id}] {}. Consider extending the synonym tables.", entry.detail)
            },
            ReconciliationOutcome::NoOp(_) => info!("🧾️ [{id}] {}", entry.detail),
            ReconciliationOutcome::Rejected(_) => {
                warn!("🧾️ [{id}] Transition conflict needs reconciliation. {} ({transition})", entry.detail)
            },
            ReconciliationOutcome::Error(_) => error!(
                "🧾️ [{id}] {}. Intended transition: {transition}. Extracted fields: {fields:?}. Payload: {}",
                entry.detail, entry.payload
            ),
        }
        match timeout(self.config.audit_timeout, self.audit.record(entry.clone())).await {
            Ok(Ok(written)) => trace!("🧾️ Decision recorded as audit entry #{}", written.id),
            Ok(Err(e)) => error!("🧾️ Could not record the decision for [{id}]. {e}. Lost entry: {entry:?}"),
            Err(_) => error!("🧾️ Timed out recording the decision for [{id}]. Lost entry: {entry:?}"),
        }
        outcome
    }
}

async fn bounded<T, F>(limit: Duration, op: &'static str, fut: F) -> Result<T, LedgerError>
where F: Future<Output = Result<T, LedgerError>> {
    timeout(limit, fut).await.unwrap_or(Err(LedgerError::Timeout(op)))
}
