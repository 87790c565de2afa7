//! Helpers for tests in this crate and in crates that depend on it (behind the `test_utils` feature).
mod memory_ledger;
pub mod prepare_env;

pub use memory_ledger::MemoryLedger;
