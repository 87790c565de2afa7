//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a screenful belong in the engine, not here.
//!
//! Handlers run on actix worker threads, which process their requests one at a time. Everything that waits on I/O
//! (in practice, the ledger and the audit log) must therefore be awaited, never blocked on.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use reconciliation_engine::{
    traits::{AuditQueryFilter, AuditSink, LedgerRepository, PaymentQueries, PaymentQueryFilter},
    AuditApi,
    PaymentsApi,
    ReconciliationApi,
};

use crate::{
    data_objects::{AuditLogParams, PaymentSearchParams, WebhookAck},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(payment_webhook => Post "/payments" impl LedgerRepository, AuditSink);
/// Route handler for processor webhook deliveries.
///
/// By the time a request gets here it has passed the IP whitelist and signature checks. The body is handed to the
/// reconciliation engine as-is, since processors do not agree on a schema.
///
/// The response is always `200 {"received": true}`, whatever the engine made of the event. Any other status would
/// make the processor retry, and a retry cannot fix a payload the engine could not apply. Failed events are found
/// through the audit log instead.
pub async fn payment_webhook<L, A>(body: web::Bytes, api: web::Data<ReconciliationApi<L, A>>) -> HttpResponse
where
    L: LedgerRepository,
    A: AuditSink,
{
    trace!("💻️ Received payment webhook ({} bytes)", body.len());
    let outcome = api.process_raw_event(body.as_ref()).await;
    debug!("💻️ Webhook processed. Outcome: {:?}", outcome.kind());
    HttpResponse::Ok().json(WebhookAck::received())
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payments => Get "/payments" impl PaymentQueries);
/// Route handler for the ledger search endpoint
///
/// All query parameters are optional: `status`, `currency`, `external_id`, `email`, `since`, `until` (RFC 3339),
/// `limit` and `offset`. Results are ordered by creation time.
pub async fn payments<B: PaymentQueries>(
    query: web::Query<PaymentSearchParams>,
    api: web::Data<PaymentsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let filter = PaymentQueryFilter::from(query.into_inner());
    debug!("💻️ GET payments. {filter}");
    let payments = api.search(filter).await.map_err(|e| {
        debug!("💻️ Could not fetch payments. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(payments))
}

route!(payment_by_id => Get "/payments/{id}" impl PaymentQueries);
pub async fn payment_by_id<B: PaymentQueries>(
    path: web::Path<i64>,
    api: web::Data<PaymentsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET payment #{id}");
    match api.payment_by_id(id).await? {
        Some(payment) => Ok(HttpResponse::Ok().json(payment)),
        None => Err(ServerError::NoRecordFound(format!("No payment with id {id}"))),
    }
}

//----------------------------------------------   Audit  ----------------------------------------------------
route!(audit_log => Get "/audit" impl AuditSink);
/// Route handler for the audit log
///
/// Filter by `outcome` (`Applied`, `NoOp`, `Rejected`, `Error`), `intent` and `external_id`. Newest entries come
/// first. Replay jobs use this to find events that were acknowledged but never applied.
pub async fn audit_log<B: AuditSink>(
    query: web::Query<AuditLogParams>,
    api: web::Data<AuditApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let filter = AuditQueryFilter::from(query.into_inner());
    debug!("💻️ GET audit log. {filter:?}");
    let entries = api.entries(filter).await?;
    Ok(HttpResponse::Ok().json(entries))
}
