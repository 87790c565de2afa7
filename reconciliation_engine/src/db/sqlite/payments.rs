use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use rec_common::CurrencyCode;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{GatewayId, NewPaymentRecord, PaymentRecord, PaymentStatus, PaymentUpdate},
    traits::{LedgerError, PaymentQueryFilter},
};

/// The `payments` table as SQLite stores it. Amounts and metadata are TEXT columns.
#[derive(Debug, Clone, FromRow)]
struct PaymentRow {
    id: i64,
    external_transaction_id: Option<String>,
    external_charge_id: Option<String>,
    amount: String,
    currency: CurrencyCode,
    status: PaymentStatus,
    gateway: GatewayId,
    description: Option<String>,
    client_email: Option<String>,
    client_name: Option<String>,
    metadata: String,
    failure_reason: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = LedgerError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let amount = Decimal::from_str(&row.amount)
            .map_err(|e| LedgerError::Conversion(format!("Payment #{} has an invalid amount. {e}", row.id)))?;
        let metadata = decode_metadata(&row.metadata)
            .map_err(|e| LedgerError::Conversion(format!("Payment #{} has invalid metadata. {e}", row.id)))?;
        Ok(PaymentRecord {
            id: row.id,
            external_transaction_id: row.external_transaction_id,
            external_charge_id: row.external_charge_id,
            amount,
            currency: row.currency,
            status: row.status,
            gateway: row.gateway,
            description: row.description,
            client_email: row.client_email,
            client_name: row.client_name,
            metadata,
            failure_reason: row.failure_reason,
            processed_at: row.processed_at,
            refunded_at: row.refunded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_metadata(s: &str) -> Result<Map<String, Value>, serde_json::Error> {
    serde_json::from_str(s)
}

fn encode_metadata(metadata: Map<String, Value>) -> Result<String, LedgerError> {
    serde_json::to_string(&Value::Object(metadata)).map_err(|e| LedgerError::Conversion(e.to_string()))
}

fn map_unique_violation(e: sqlx::Error, external_id: Option<String>) -> LedgerError {
    match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            LedgerError::DuplicateExternalId(external_id.unwrap_or_default())
        },
        e => LedgerError::from(e),
    }
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentRecord>, LedgerError> {
    let row: Option<PaymentRow> =
        sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    row.map(PaymentRecord::try_from).transpose()
}

pub async fn fetch_by_external_id(
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, LedgerError> {
    let row: Option<PaymentRow> = sqlx::query_as("SELECT * FROM payments WHERE external_transaction_id = $1")
        .bind(external_id)
        .fetch_optional(conn)
        .await?;
    row.map(PaymentRecord::try_from).transpose()
}

/// Returns every payment whose metadata `reference` matches, oldest first.
pub async fn fetch_by_metadata_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentRecord>, LedgerError> {
    let rows: Vec<PaymentRow> =
        sqlx::query_as("SELECT * FROM payments WHERE json_extract(metadata, '$.reference') = $1 ORDER BY id ASC")
            .bind(reference)
            .fetch_all(conn)
            .await?;
    rows.into_iter().map(PaymentRecord::try_from).collect()
}

/// Inserts a new payment. Fails with `DuplicateExternalId` if the external transaction id is already in the ledger.
pub async fn insert_payment(
    payment: NewPaymentRecord,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, LedgerError> {
    let external_id = payment.external_transaction_id.clone();
    let metadata = encode_metadata(payment.metadata)?;
    let row: PaymentRow = sqlx::query_as(
        r#"
            INSERT INTO payments (
                external_transaction_id,
                external_charge_id,
                amount,
                currency,
                status,
                gateway,
                description,
                client_email,
                client_name,
                metadata,
                failure_reason,
                processed_at,
                refunded_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            RETURNING *;
        "#,
    )
    .bind(payment.external_transaction_id)
    .bind(payment.external_charge_id)
    .bind(payment.amount.to_string())
    .bind(payment.currency)
    .bind(payment.status)
    .bind(payment.gateway)
    .bind(payment.description)
    .bind(payment.client_email)
    .bind(payment.client_name)
    .bind(metadata)
    .bind(payment.failure_reason)
    .bind(payment.processed_at)
    .bind(payment.refunded_at)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| map_unique_violation(e, external_id))?;
    debug!("🗃️ Payment #{} inserted with status {}", row.id, row.status);
    row.try_into()
}

/// Applies the update only if the payment is still in the `expected` state. The check and the write are a single
/// statement, so there is no window for another writer to slip in between them.
pub async fn update_payment_conditional(
    id: i64,
    expected: PaymentStatus,
    update: PaymentUpdate,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, LedgerError> {
    let external_id = update.external_transaction_id.clone();
    let metadata = encode_metadata(update.metadata)?;
    let row: Option<PaymentRow> = sqlx::query_as(
        r#"
            UPDATE payments SET
                status = $1,
                external_transaction_id = COALESCE($2, external_transaction_id),
                external_charge_id = COALESCE($3, external_charge_id),
                amount = COALESCE($4, amount),
                currency = COALESCE($5, currency),
                description = COALESCE($6, description),
                client_email = COALESCE($7, client_email),
                client_name = COALESCE($8, client_name),
                metadata = $9,
                failure_reason = COALESCE($10, failure_reason),
                processed_at = COALESCE($11, processed_at),
                refunded_at = COALESCE($12, refunded_at),
                updated_at = $13
            WHERE id = $14 AND status = $15
            RETURNING *;
        "#,
    )
    .bind(update.status)
    .bind(update.external_transaction_id)
    .bind(update.external_charge_id)
    .bind(update.amount.map(|a| a.to_string()))
    .bind(update.currency)
    .bind(update.description)
    .bind(update.client_email)
    .bind(update.client_name)
    .bind(metadata)
    .bind(update.failure_reason)
    .bind(update.processed_at)
    .bind(update.refunded_at)
    .bind(now)
    .bind(id)
    .bind(expected)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_unique_violation(e, external_id))?;
    match row {
        Some(row) => {
            debug!("🗃️ Payment #{id} moved from {expected} to {}", row.status);
            row.try_into()
        },
        None => {
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await?;
            match exists {
                Some(_) => Err(LedgerError::StaleRecord { id, expected }),
                None => Err(LedgerError::NotFound(id)),
            }
        },
    }
}

/// Fetches payments according to the criteria in the `PaymentQueryFilter`, ordered by `created_at` ascending.
pub async fn search_payments(
    query: PaymentQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentRecord>, LedgerError> {
    let mut builder = QueryBuilder::new("SELECT * FROM payments ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(status) = query.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status);
    }
    if let Some(currency) = &query.currency {
        where_clause.push("currency = ");
        where_clause.push_bind_unseparated(currency.to_ascii_uppercase());
    }
    if let Some(external_id) = &query.external_id {
        where_clause.push("external_transaction_id = ");
        where_clause.push_bind_unseparated(external_id.clone());
    }
    if let Some(email) = &query.client_email {
        where_clause.push("client_email = ");
        where_clause.push_bind_unseparated(email.clone());
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC, id ASC LIMIT ");
    builder.push_bind(query.page_size());
    builder.push(" OFFSET ");
    builder.push_bind(query.offset.unwrap_or(0).max(0));

    trace!("🗃️ Executing query: {}", builder.sql());
    let rows = builder.build_query_as::<PaymentRow>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_payments: {}", rows.len());
    rows.into_iter().map(PaymentRecord::try_from).collect()
}
