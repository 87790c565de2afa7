//! Downstream notifications for ledger changes.
//!
//! The engine publishes an event whenever a payment succeeds, fails or is refunded, and only once per change. The
//! handlers registered here hand those events to customer messaging. Messaging itself lives outside this server, so
//! for now each handler writes a structured log line under the `rps::notifications` target, which the messaging
//! relay tails.
use std::{future::Future, pin::Pin};

use log::*;
use reconciliation_engine::events::{
    EventHandlers,
    EventHooks,
    PaymentFailedEvent,
    PaymentRefundedEvent,
    PaymentSucceededEvent,
};

const TARGET: &str = "rps::notifications";

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub fn create_notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_payment_succeeded(|ev| notify(payment_succeeded_message(&ev)))
        .on_payment_failed(|ev| notify(payment_failed_message(&ev)))
        .on_payment_refunded(|ev| notify(payment_refunded_message(&ev)));
    hooks
}

pub fn create_notification_handlers(buffer_size: usize) -> EventHandlers {
    EventHandlers::new(buffer_size, create_notification_hooks())
}

fn notify(message: String) -> HookFuture {
    Box::pin(async move {
        info!(target: TARGET, "📬️ {message}");
    })
}

fn recipient(email: Option<&str>) -> &str {
    email.unwrap_or("<no email on record>")
}

pub fn payment_succeeded_message(ev: &PaymentSucceededEvent) -> String {
    let p = &ev.payment;
    format!(
        "Payment confirmation to {}: {} {} received for {}",
        recipient(p.client_email.as_deref()),
        p.amount,
        p.currency,
        p.external_transaction_id.as_deref().unwrap_or("<no transaction id>")
    )
}

pub fn payment_failed_message(ev: &PaymentFailedEvent) -> String {
    let p = &ev.payment;
    format!(
        "Payment failure notice to {}: {} {} for {} failed. Reason: {}",
        recipient(p.client_email.as_deref()),
        p.amount,
        p.currency,
        p.external_transaction_id.as_deref().unwrap_or("<no transaction id>"),
        ev.reason.as_deref().unwrap_or("not given")
    )
}

pub fn payment_refunded_message(ev: &PaymentRefundedEvent) -> String {
    let p = &ev.payment;
    format!(
        "Refund confirmation to {}: {} {} refunded for {} at {}",
        recipient(p.client_email.as_deref()),
        ev.refund_amount,
        p.currency,
        p.external_transaction_id.as_deref().unwrap_or("<no transaction id>"),
        ev.refunded_at.to_rfc3339()
    )
}
