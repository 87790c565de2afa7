#![allow(dead_code)]

use log::*;
use reconciliation_engine::{
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    ReconcilerConfig,
    ReconciliationApi,
    SqliteDatabase,
};
use serde_json::{json, Value};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub type Api = ReconciliationApi<SqliteDatabase, SqliteDatabase>;

pub async fn setup() -> Api {
    setup_with_producers(EventProducers::default()).await
}

pub async fn setup_with_producers(producers: EventProducers) -> Api {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    ReconciliationApi::new(db.clone(), db, producers, ReconcilerConfig::default())
}

pub async fn tear_down(db: &SqliteDatabase) {
    db.close().await;
    if let Err(e) = Sqlite::drop_database(db.url()).await {
        error!("🚀️ Failed to drop test database: {e}");
    }
}

pub fn event(event_type: &str, id: &str, amount: u64) -> Value {
    json!({ "event_type": event_type, "id": id, "amount": amount, "currency": "USD" })
}
