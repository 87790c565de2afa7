use actix_web::{http::StatusCode, test::TestRequest};
use reconciliation_engine::{
    events::EventProducers,
    test_utils::MemoryLedger,
    traits::LedgerError,
    ReconcilerConfig,
    ReconciliationApi,
};
use serde_json::{json, Value};

use super::{
    helpers::{api_request, call, test_config, Backends},
    mocks::MockBackend,
};

async fn seeded_ledger() -> MemoryLedger {
    let ledger = MemoryLedger::new();
    let api = ReconciliationApi::new(
        ledger.clone(),
        ledger.clone(),
        EventProducers::default(),
        ReconcilerConfig::default(),
    );
    let events = [
        json!({"event_type": "payment.succeeded", "id": "tx_1", "amount": 15000, "currency": "USD",
               "customer_email": "alice@example.com"}),
        json!({"event_type": "payment.created", "id": "tx_2", "amount": 2500, "currency": "EUR"}),
        json!({"event_type": "payment.failed", "id": "tx_2", "amount": 2500, "currency": "EUR",
               "failure_reason": "card_declined"}),
        json!({"event_type": "payment.created", "id": "tx_3", "amount": 999, "currency": "USD"}),
        json!({"event_type": "customer.updated", "id": "cus_9"}),
    ];
    for event in events {
        api.process_event(event).await;
    }
    ledger
}

fn parse(body: &str) -> Value {
    serde_json::from_str(body).expect("Response was not JSON")
}

#[actix_web::test]
async fn api_key_is_required() {
    let ledger = seeded_ledger().await;
    let req = TestRequest::get().uri("/api/payments");
    let (status, body) = call(Backends::shared(ledger.clone()), &test_config(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No API key"));

    let req = TestRequest::get().uri("/api/payments").insert_header(("Authorization", "Bearer not-the-key"));
    let (status, body) = call(Backends::shared(ledger), &test_config(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("API key is invalid"));
}

#[actix_web::test]
async fn api_is_disabled_without_a_key() {
    let ledger = seeded_ledger().await;
    let mut config = test_config();
    config.api_key = None;
    let (status, _) = call(Backends::shared(ledger), &config, api_request("/api/payments")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn search_payments() {
    let ledger = seeded_ledger().await;
    let config = test_config();
    let (status, body) = call(Backends::shared(ledger.clone()), &config, api_request("/api/payments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body).as_array().unwrap().len(), 3);

    let (status, body) =
        call(Backends::shared(ledger.clone()), &config, api_request("/api/payments?status=Succeeded")).await;
    assert_eq!(status, StatusCode::OK);
    let payments = parse(&body);
    let payments = payments.as_array().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["external_transaction_id"], "tx_1");
    assert_eq!(payments[0]["status"], "Succeeded");

    let (_, body) = call(Backends::shared(ledger.clone()), &config, api_request("/api/payments?currency=usd")).await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 2);

    let (_, body) =
        call(Backends::shared(ledger), &config, api_request("/api/payments?email=alice@example.com")).await;
    let payments = parse(&body);
    assert_eq!(payments.as_array().unwrap().len(), 1);
    assert_eq!(payments[0]["external_transaction_id"], "tx_1");
}

#[actix_web::test]
async fn fetch_payment_by_id() {
    let ledger = seeded_ledger().await;
    let config = test_config();
    let failed = ledger.payments().into_iter().find(|p| p.external_transaction_id.as_deref() == Some("tx_2")).unwrap();
    let path = format!("/api/payments/{}", failed.id);
    let (status, body) = call(Backends::shared(ledger.clone()), &config, api_request(&path)).await;
    assert_eq!(status, StatusCode::OK);
    let payment = parse(&body);
    assert_eq!(payment["status"], "Failed");
    assert_eq!(payment["failure_reason"], "card_declined");
    assert_eq!(payment["currency"], "EUR");

    let (status, body) = call(Backends::shared(ledger), &config, api_request("/api/payments/9999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("No payment with id 9999"));
}

#[actix_web::test]
async fn audit_log_filters() {
    let ledger = seeded_ledger().await;
    let config = test_config();
    let (status, body) = call(Backends::shared(ledger.clone()), &config, api_request("/api/audit")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body).as_array().unwrap().len(), 5);

    let (status, body) = call(Backends::shared(ledger), &config, api_request("/api/audit?outcome=NoOp")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = parse(&body);
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["intent"], "Unknown");
    assert_eq!(entries[0]["external_transaction_id"], "cus_9");
}

#[actix_web::test]
async fn backend_errors_are_reported() {
    let mut payments_reader = MockBackend::new();
    payments_reader
        .expect_search_payments()
        .times(1)
        .returning(|_| Err(LedgerError::DriverError("connection reset".into())));
    let backends = Backends {
        ledger: MockBackend::new(),
        audit: MockBackend::new(),
        payments_reader,
        audit_reader: MockBackend::new(),
    };
    let (status, body) = call(backends, &test_config(), api_request("/api/payments")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("connection reset"));
}
