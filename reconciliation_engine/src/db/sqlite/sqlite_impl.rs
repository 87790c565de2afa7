//! `SqliteDatabase` is the SQLite implementation of the ledger, payment query and audit traits.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite, SqlitePool};

use super::{audit, db_url, new_pool, payments};
use crate::{
    db_types::{AuditEntry, NewAuditEntry, NewPaymentRecord, PaymentRecord, PaymentStatus, PaymentUpdate},
    traits::{
        AuditError,
        AuditQueryFilter,
        AuditSink,
        LedgerError,
        LedgerRepository,
        PaymentQueries,
        PaymentQueryFilter,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database named by `RPS_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, LedgerError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    /// Connects to the database at `url`, creating the database file if it does not exist yet.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        if !Sqlite::database_exists(url).await? {
            info!("🗃️ Creating new database at {url}");
            Sqlite::create_database(url).await?;
        }
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::DriverError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        debug!("🗃️ Database connection pool closed");
    }
}

impl LedgerRepository for SqliteDatabase {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PaymentRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_by_external_id(external_id, &mut conn).await
    }

    async fn find_by_metadata_reference(&self, reference: &str) -> Result<Vec<PaymentRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_by_metadata_reference(reference, &mut conn).await
    }

    async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_payment(record, Utc::now(), &mut conn).await
    }

    async fn update_conditional(
        &self,
        id: i64,
        expected: PaymentStatus,
        update: PaymentUpdate,
    ) -> Result<PaymentRecord, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        payments::update_payment_conditional(id, expected, update, Utc::now(), &mut conn).await
    }
}

impl PaymentQueries for SqliteDatabase {
    async fn fetch_payment(&self, id: i64) -> Result<Option<PaymentRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(id, &mut conn).await
    }

    async fn search_payments(&self, filter: PaymentQueryFilter) -> Result<Vec<PaymentRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        payments::search_payments(filter, &mut conn).await
    }
}

impl AuditSink for SqliteDatabase {
    async fn record(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError> {
        let mut conn = self.pool.acquire().await?;
        audit::insert_entry(entry, Utc::now(), &mut conn).await
    }

    async fn fetch_entries(&self, filter: AuditQueryFilter) -> Result<Vec<AuditEntry>, AuditError> {
        let mut conn = self.pool.acquire().await.map_err(|e| AuditError::ReadFailed(e.to_string()))?;
        audit::fetch_entries(filter, &mut conn).await
    }
}
