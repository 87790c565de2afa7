use actix_web::{body::to_bytes, http::StatusCode, test, test::TestRequest, web, App};
use log::debug;
use rec_common::Secret;
use reconciliation_engine::{
    events::EventProducers,
    traits::{AuditSink, LedgerRepository, PaymentQueries},
    AuditApi,
    PaymentsApi,
    ReconcilerConfig,
    ReconciliationApi,
};

use crate::{config::ServerConfig, helpers::calculate_hmac, server::configure_routes};

pub const SECRET: &str = "whsec_endpoint_tests";
pub const API_KEY: &str = "rps-test-key";
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Each API gets its own backend, so that mocks can carry different expectations.
pub struct Backends<B> {
    pub ledger: B,
    pub audit: B,
    pub payments_reader: B,
    pub audit_reader: B,
}

impl<B: Clone> Backends<B> {
    pub fn shared(backend: B) -> Self {
        Self {
            ledger: backend.clone(),
            audit: backend.clone(),
            payments_reader: backend.clone(),
            audit_reader: backend,
        }
    }
}

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.webhook.hmac_secret = Secret::new(SECRET.into());
    config.api_key = Some(Secret::new(API_KEY.into()));
    config
}

pub fn sign(body: &str) -> String {
    calculate_hmac(SECRET, body.as_bytes()).unwrap()
}

pub fn webhook_request(body: &str) -> TestRequest {
    TestRequest::post()
        .uri("/webhook/payments")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, sign(body)))
        .set_payload(body.to_string())
}

pub fn api_request(path: &str) -> TestRequest {
    TestRequest::get().uri(path).insert_header(("Authorization", format!("Bearer {API_KEY}")))
}

/// Runs a single request through the full route configuration. Middleware errors are rendered into responses, as the
/// server would.
pub async fn call<B>(backends: Backends<B>, config: &ServerConfig, req: TestRequest) -> (StatusCode, String)
where B: LedgerRepository + AuditSink + PaymentQueries + 'static {
    let _ = env_logger::try_init();
    let Backends { ledger, audit, payments_reader, audit_reader } = backends;
    let reconciliation_api =
        ReconciliationApi::new(ledger, audit, EventProducers::default(), ReconcilerConfig::default());
    let app = App::new()
        .app_data(web::Data::new(reconciliation_api))
        .app_data(web::Data::new(PaymentsApi::new(payments_reader)))
        .app_data(web::Data::new(AuditApi::new(audit_reader)))
        .configure(|cfg| configure_routes::<B>(cfg, config));
    debug!("Making request");
    let service = test::init_service(app).await;
    let res = match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => res.into_parts().1.map_into_boxed_body(),
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let body = to_bytes(res.into_body()).await.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
    (status, body)
}
