use std::time::Duration;

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    web::ServiceConfig,
    App,
    HttpServer,
};
use futures::future::{ready, Either};
use log::*;
use reconciliation_engine::{
    events::EventProducers,
    traits::{AuditSink, LedgerRepository, PaymentQueries},
    AuditApi,
    PaymentsApi,
    ReconciliationApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::{AuthError, ServerError},
    helpers::{get_remote_ip, is_whitelisted},
    middleware::{ApiKeyMiddlewareFactory, HmacMiddlewareFactory},
    notifications::create_notification_handlers,
    routes::{health, AuditLogRoute, PaymentByIdRoute, PaymentWebhookRoute, PaymentsRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_notification_handlers(config.event_buffer_size);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let reconciliation_api =
            ReconciliationApi::new(db.clone(), db.clone(), producers.clone(), config.reconciler.clone());
        let payments_api = PaymentsApi::new(db.clone());
        let audit_api = AuditApi::new(db.clone());
        let config = config.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("rps::access_log"))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(audit_api))
            .configure(move |cfg| configure_routes::<SqliteDatabase>(cfg, &config))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    info!("💻️ Listening on {host}:{port}");
    Ok(srv)
}

/// Registers every route. The backend's APIs (`ReconciliationApi<B, B>`, `PaymentsApi<B>` and `AuditApi<B>`) must
/// already be registered as app data.
///
/// * `/health`
/// * `/webhook/payments`, behind the IP whitelist and the signature check
/// * `/api/payments`, `/api/payments/{id}` and `/api/audit`, behind the API key
pub fn configure_routes<B>(cfg: &mut ServiceConfig, config: &ServerConfig)
where B: LedgerRepository + AuditSink + PaymentQueries + 'static {
    let use_x_forwarded_for = config.use_x_forwarded_for;
    let use_forwarded = config.use_forwarded;
    let whitelist = config.webhook.whitelist.clone();
    let hmac = HmacMiddlewareFactory::new(
        &config.webhook.signature_header,
        config.webhook.hmac_secret.clone(),
        config.webhook.hmac_checks,
    );
    // Middleware registered last runs first, so the whitelist is checked before the signature
    let webhook_scope = web::scope("/webhook")
        .wrap(hmac)
        .wrap_fn(move |req, srv| {
            let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
            if is_whitelisted(peer_ip, whitelist.as_deref()) {
                Either::Left(srv.call(req))
            } else {
                let err = actix_web::Error::from(ServerError::from(AuthError::ForbiddenPeer));
                Either::Right(ready(Err(err)))
            }
        })
        .service(PaymentWebhookRoute::<B, B>::new());
    let api_scope = web::scope("/api")
        .wrap(ApiKeyMiddlewareFactory::new(config.api_key.clone()))
        .service(PaymentsRoute::<B>::new())
        .service(PaymentByIdRoute::<B>::new())
        .service(AuditLogRoute::<B>::new());
    cfg.service(health).service(webhook_scope).service(api_scope);
}
