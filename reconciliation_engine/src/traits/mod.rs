//! # Storage contracts
//!
//! The engine never talks to a database directly. Backends implement these traits, and the APIs in [`crate::rec_api`]
//! are generic over them, so the storage layer can be swapped (or mocked) without touching the reconciliation logic.
//!
//! * [`LedgerRepository`] is the write path used by the reconciliation orchestrator. Its `update_conditional` method
//!   is the optimistic concurrency guard: a write only lands if the record is still in the state it was read in.
//! * [`PaymentQueries`] is the read side, for collaborators that list or display payments.
//! * [`AuditSink`] receives every reconciliation decision, including the ones that did not change the ledger.
mod audit_sink;
mod ledger_repository;
mod payment_queries;

pub use audit_sink::{AuditError, AuditQueryFilter, AuditSink};
pub use ledger_repository::{LedgerError, LedgerRepository};
pub use payment_queries::{PaymentQueries, PaymentQueryFilter};
