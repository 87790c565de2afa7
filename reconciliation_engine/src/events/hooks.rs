use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    EventType,
    Handler,
    PaymentFailedEvent,
    PaymentRefundedEvent,
    PaymentSucceededEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The producer halves of the registered hooks. Cloned into every API that publishes events.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_succeeded_producer: Vec<EventProducer<PaymentSucceededEvent>>,
    pub payment_failed_producer: Vec<EventProducer<PaymentFailedEvent>>,
    pub payment_refunded_producer: Vec<EventProducer<PaymentRefundedEvent>>,
}

impl EventProducers {
    pub async fn publish(&self, event: EventType) {
        match event {
            EventType::PaymentSucceeded(ev) => publish_all(&self.payment_succeeded_producer, ev).await,
            EventType::PaymentFailed(ev) => publish_all(&self.payment_failed_producer, ev).await,
            EventType::PaymentRefunded(ev) => publish_all(&self.payment_refunded_producer, ev).await,
        }
    }
}

async fn publish_all<E: Clone + Send + Sync>(producers: &[EventProducer<E>], event: E) {
    for producer in producers {
        producer.publish_event(event.clone()).await;
    }
}

pub struct EventHandlers {
    pub on_payment_succeeded: Option<EventHandler<PaymentSucceededEvent>>,
    pub on_payment_failed: Option<EventHandler<PaymentFailedEvent>>,
    pub on_payment_refunded: Option<EventHandler<PaymentRefundedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_succeeded = hooks.on_payment_succeeded.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_failed = hooks.on_payment_failed.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_refunded = hooks.on_payment_refunded.map(|f| EventHandler::new(buffer_size, f));
        Self { on_payment_succeeded, on_payment_failed, on_payment_refunded }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_succeeded {
            result.payment_succeeded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_failed {
            result.payment_failed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_refunded {
            result.payment_refunded_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per registered handler. Each one runs until every producer for it has been dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_succeeded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_failed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_refunded {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_succeeded: Option<Handler<PaymentSucceededEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
    pub on_payment_refunded: Option<Handler<PaymentRefundedEvent>>,
}

impl EventHooks {
    pub fn on_payment_succeeded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentSucceededEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_succeeded = Some(Arc::new(f));
        self
    }

    pub fn on_payment_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentFailedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_failed = Some(Arc::new(f));
        self
    }

    pub fn on_payment_refunded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentRefundedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_refunded = Some(Arc::new(f));
        self
    }
}
