//! # Reconciliation engine public API
//!
//! The API is modular. Each part is created by supplying a backend that implements the storage traits it needs, so
//! the reconciliation write path and the read APIs can run against different backends if need be.
//!
//! * [`reconciliation_api`] is the orchestrator. It turns processor events into ledger writes.
//! * [`payments_api`] lists and fetches ledger records.
//! * [`audit_api`] reads the audit log of reconciliation decisions.
//!
//! ```rust,ignore
//! use reconciliation_engine::{events::EventProducers, ReconcilerConfig, ReconciliationApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/reconciliation.db", 25).await?;
//! let api = ReconciliationApi::new(db.clone(), db, EventProducers::default(), ReconcilerConfig::default());
//! let outcome = api.process_event(payload).await;
//! ```
pub mod audit_api;
pub mod config;
pub mod errors;
pub mod outcome;
pub mod payments_api;
pub mod reconciliation_api;
