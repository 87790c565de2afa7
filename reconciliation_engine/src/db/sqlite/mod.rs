//! # SQLite ledger backend
//!
//! The low-level queries live in [`payments`] and [`audit`] as plain functions that take a `&mut SqliteConnection`,
//! so callers can run them on a pooled connection or inside a transaction without any other changes.
//! [`SqliteDatabase`] wires them up to the storage traits.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod audit;
pub mod payments;
mod sqlite_impl;

pub use sqlite_impl::SqliteDatabase;

const SQLITE_DB_URL: &str = "sqlite://data/reconciliation.db";

pub fn db_url() -> String {
    let result = env::var("RPS_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ RPS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
