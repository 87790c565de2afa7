use chrono::{DateTime, Utc};
use log::trace;
use serde_json::Value;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use crate::{
    classifier::LifecycleIntent,
    db_types::{AuditEntry, NewAuditEntry, OutcomeKind},
    traits::{AuditError, AuditQueryFilter},
};

#[derive(Debug, Clone, FromRow)]
struct AuditRow {
    id: i64,
    received_at: DateTime<Utc>,
    intent: LifecycleIntent,
    raw_status: Option<String>,
    external_transaction_id: Option<String>,
    payment_id: Option<i64>,
    transition: Option<String>,
    outcome: OutcomeKind,
    detail: String,
    payload: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = AuditError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let payload: Value = serde_json::from_str(&row.payload)
            .map_err(|e| AuditError::ReadFailed(format!("Audit entry #{} has an invalid payload. {e}", row.id)))?;
        Ok(AuditEntry {
            id: row.id,
            received_at: row.received_at,
            intent: row.intent,
            raw_status: row.raw_status,
            external_transaction_id: row.external_transaction_id,
            payment_id: row.payment_id,
            transition: row.transition,
            outcome: row.outcome,
            detail: row.detail,
            payload,
            created_at: row.created_at,
        })
    }
}

pub async fn insert_entry(
    entry: NewAuditEntry,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<AuditEntry, AuditError> {
    let payload = serde_json::to_string(&entry.payload).map_err(|e| AuditError::WriteFailed(e.to_string()))?;
    let row: AuditRow = sqlx::query_as(
        r#"
            INSERT INTO audit_log (
                received_at,
                intent,
                raw_status,
                external_transaction_id,
                payment_id,
                transition,
                outcome,
                detail,
                payload,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(entry.received_at)
    .bind(entry.intent)
    .bind(entry.raw_status)
    .bind(entry.external_transaction_id)
    .bind(entry.payment_id)
    .bind(entry.transition)
    .bind(entry.outcome)
    .bind(entry.detail)
    .bind(payload)
    .bind(now)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Audit entry #{} recorded ({})", row.id, row.outcome);
    row.try_into()
}

/// Fetches audit entries matching the filter, newest first.
pub async fn fetch_entries(
    query: AuditQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<AuditEntry>, AuditError> {
    let mut builder = QueryBuilder::new("SELECT * FROM audit_log ");
    if query.outcome.is_some() || query.intent.is_some() || query.external_id.is_some() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(outcome) = query.outcome {
        where_clause.push("outcome = ");
        where_clause.push_bind_unseparated(outcome);
    }
    if let Some(intent) = query.intent {
        where_clause.push("intent = ");
        where_clause.push_bind_unseparated(intent);
    }
    if let Some(external_id) = &query.external_id {
        where_clause.push("external_transaction_id = ");
        where_clause.push_bind_unseparated(external_id.clone());
    }
    builder.push(" ORDER BY id DESC LIMIT ");
    builder.push_bind(query.page_size());

    trace!("🗃️ Executing query: {}", builder.sql());
    let rows = builder
        .build_query_as::<AuditRow>()
        .fetch_all(conn)
        .await
        .map_err(|e| AuditError::ReadFailed(e.to_string()))?;
    rows.into_iter().map(AuditEntry::try_from).collect()
}
