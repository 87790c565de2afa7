//! Payment Reconciliation Engine
//!
//! The engine ingests asynchronous lifecycle notifications from a payment processor and applies them to a durable
//! payment ledger. The processor delivers events at least once, in any order, possibly concurrently, and with no
//! fixed schema. The engine makes sure the ledger still only ever moves forward, and that each change is applied (and
//! announced) exactly once.
//!
//! Each event passes through the following stages, leaf-first:
//! 1. [`extractor`] pulls identifiers, amounts and status strings out of the payload using ordered alias lists.
//! 2. [`amount`] resolves the minor/major unit ambiguity of the amount.
//! 3. [`classifier`] maps the status strings to a [`LifecycleIntent`].
//! 4. [`resolver`] finds the ledger record the event belongs to, if there is one.
//! 5. [`transitions`] decides what the event means for that record.
//! 6. The ledger backend ([`traits::LedgerRepository`]) writes the change, conditionally on the record not having
//!    changed since it was read.
//!
//! [`ReconciliationApi`] drives the whole flow and records every decision with an [`traits::AuditSink`]. Applied
//! changes are also published on the [`events`] hook channels, for downstream messaging.
//!
//! Storage is abstracted behind the traits in [`traits`]. [`SqliteDatabase`] is the bundled backend.
pub mod amount;
pub mod classifier;
mod db;
pub mod db_types;
pub mod events;
pub mod extractor;
mod rec_api;
pub mod resolver;
pub mod traits;
pub mod transitions;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use amount::{AmountError, AmountNormalizer, AmountUnitPolicy};
pub use classifier::{classify, LifecycleIntent};
#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use extractor::{ExtractionError, FieldAliases, FieldExtractor};
pub use rec_api::{
    audit_api::AuditApi,
    config::ReconcilerConfig,
    errors::ReconciliationError,
    outcome::{AppliedChange, ReconciliationOutcome},
    payments_api::PaymentsApi,
    reconciliation_api::ReconciliationApi,
};
pub use transitions::{NoOpReason, TransitionConflict, TransitionEngine};
