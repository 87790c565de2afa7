use actix_web::http::StatusCode;
use reconciliation_engine::{
    classifier::LifecycleIntent,
    db_types::{OutcomeKind, PaymentStatus},
    test_utils::MemoryLedger,
    traits::{AuditError, LedgerError},
};

use super::{
    helpers::{call, sign, test_config, webhook_request, Backends, SIGNATURE_HEADER},
    mocks::MockBackend,
};

const ACK: &str = r#"{"received":true}"#;
const EXAMPLE_EVENT: &str = r#"{"event_type":"payment.succeeded","id":"tx_1","amount":15000,"currency":"USD"}"#;

#[actix_web::test]
async fn signed_event_is_applied_and_acknowledged() {
    let ledger = MemoryLedger::new();
    let (status, body) = call(Backends::shared(ledger.clone()), &test_config(), webhook_request(EXAMPLE_EVENT)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK);
    let payments = ledger.payments();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].external_transaction_id.as_deref(), Some("tx_1"));
    assert_eq!(payments[0].amount.to_string(), "150.00");
    assert_eq!(payments[0].status, PaymentStatus::Succeeded);
    assert!(payments[0].processed_at.is_some());
}

#[actix_web::test]
async fn redelivery_is_acknowledged_without_a_second_change() {
    let ledger = MemoryLedger::new();
    let config = test_config();
    for _ in 0..2 {
        let (status, body) = call(Backends::shared(ledger.clone()), &config, webhook_request(EXAMPLE_EVENT)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ACK);
    }
    assert_eq!(ledger.payments().len(), 1);
    let outcomes = ledger.audit_entries().iter().map(|e| e.outcome).collect::<Vec<_>>();
    assert_eq!(outcomes, vec![OutcomeKind::Applied, OutcomeKind::NoOp]);
}

#[actix_web::test]
async fn unknown_and_malformed_events_are_acknowledged() {
    let ledger = MemoryLedger::new();
    let config = test_config();
    let unknown = r#"{"event_type":"customer.created","id":"cus_1"}"#;
    let (status, body) = call(Backends::shared(ledger.clone()), &config, webhook_request(unknown)).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, ACK));
    let (status, body) = call(Backends::shared(ledger.clone()), &config, webhook_request("this is not json")).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, ACK));

    assert!(ledger.payments().is_empty());
    let audit = ledger.audit_entries();
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].intent, LifecycleIntent::Unknown);
    assert_eq!(audit[0].outcome, OutcomeKind::NoOp);
    assert_eq!(audit[1].outcome, OutcomeKind::Error);
}

#[actix_web::test]
async fn missing_signature_is_rejected() {
    let ledger = MemoryLedger::new();
    let req = actix_web::test::TestRequest::post().uri("/webhook/payments").set_payload(EXAMPLE_EVENT);
    let (status, body) = call(Backends::shared(ledger.clone()), &test_config(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No signature"));
    assert!(ledger.payments().is_empty());
    assert!(ledger.audit_entries().is_empty());
}

#[actix_web::test]
async fn invalid_signature_is_rejected() {
    let ledger = MemoryLedger::new();
    // Signed for a different body
    let req = webhook_request(EXAMPLE_EVENT).insert_header((SIGNATURE_HEADER, sign(r#"{"amount":1}"#)));
    let (status, _) = call(Backends::shared(ledger.clone()), &test_config(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(ledger.payments().is_empty());
}

#[actix_web::test]
async fn prefixed_base64_signatures_are_accepted() {
    let ledger = MemoryLedger::new();
    let raw = hex::decode(sign(EXAMPLE_EVENT)).unwrap();
    let header = format!("sha256={}", base64::encode(raw));
    let req = webhook_request(EXAMPLE_EVENT).insert_header((SIGNATURE_HEADER, header));
    let (status, _) = call(Backends::shared(ledger.clone()), &test_config(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.payments().len(), 1);
}

#[actix_web::test]
async fn signature_checks_can_be_disabled() {
    let ledger = MemoryLedger::new();
    let mut config = test_config();
    config.webhook.hmac_checks = false;
    let req = actix_web::test::TestRequest::post().uri("/webhook/payments").set_payload(EXAMPLE_EVENT);
    let (status, _) = call(Backends::shared(ledger.clone()), &config, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.payments().len(), 1);
}

#[actix_web::test]
async fn unconfigured_secret_rejects_everything() {
    let ledger = MemoryLedger::new();
    let mut config = test_config();
    config.webhook.hmac_secret = Default::default();
    let (status, _) = call(Backends::shared(ledger.clone()), &config, webhook_request(EXAMPLE_EVENT)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(ledger.payments().is_empty());
}

#[actix_web::test]
async fn ip_whitelist() {
    let ledger = MemoryLedger::new();
    let mut config = test_config();
    config.webhook.whitelist = Some(vec!["10.0.0.1".parse().unwrap()]);
    let req = webhook_request(EXAMPLE_EVENT).peer_addr("10.0.0.2:443".parse().unwrap());
    let (status, _) = call(Backends::shared(ledger.clone()), &config, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(ledger.payments().is_empty());

    let req = webhook_request(EXAMPLE_EVENT).peer_addr("10.0.0.1:443".parse().unwrap());
    let (status, _) = call(Backends::shared(ledger.clone()), &config, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.payments().len(), 1);
}

#[actix_web::test]
async fn backend_failures_are_still_acknowledged() {
    let mut ledger = MockBackend::new();
    ledger
        .expect_find_by_external_id()
        .times(1)
        .returning(|_| Err(LedgerError::DriverError("database is locked".into())));
    ledger.expect_create().never();
    let mut audit = MockBackend::new();
    audit.expect_record().times(1).returning(|_| Err(AuditError::WriteFailed("disk full".into())));
    let backends =
        Backends { ledger, audit, payments_reader: MockBackend::new(), audit_reader: MockBackend::new() };
    let (status, body) = call(backends, &test_config(), webhook_request(EXAMPLE_EVENT)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK);
}
