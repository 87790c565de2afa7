use std::sync::Arc;

use log::*;
use reconciliation_engine::{
    db_types::PaymentStatus,
    traits::{PaymentQueries, PaymentQueryFilter},
    LifecycleIntent,
    ReconciliationOutcome,
    TransitionConflict,
};

mod support;

use support::{event, setup, tear_down};

const NUM_TRANSACTIONS: usize = 25;

/// `Created` and `Succeeded` for the same new transaction, delivered at the same time, must produce exactly one
/// record, and it must end up `Succeeded`, whichever event wins the race to create it. A `Created` that arrives
/// after the success is rejected as a backward move, and nothing else may be.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn created_and_succeeded_race() {
    let api = Arc::new(setup().await);
    let mut jobs = vec![];
    for i in 0..NUM_TRANSACTIONS {
        let id = format!("race_{i}");
        for event_type in ["payment.created", "payment.succeeded"] {
            let api = Arc::clone(&api);
            let payload = event(event_type, &id, 1200);
            jobs.push(tokio::spawn(async move { api.process_event(payload).await }));
        }
    }
    let late_created = TransitionConflict { current: PaymentStatus::Succeeded, intent: LifecycleIntent::Created };
    for job in jobs {
        let outcome = job.await.expect("reconciliation task panicked");
        info!("🏁️ {outcome}");
        match &outcome {
            ReconciliationOutcome::Error(_) => panic!("unexpected outcome: {outcome}"),
            ReconciliationOutcome::Rejected(conflict) => assert_eq!(*conflict, late_created),
            _ => {},
        }
    }

    let payments = api.ledger().search_payments(PaymentQueryFilter::default().with_page(1000, 0)).await.unwrap();
    assert_eq!(payments.len(), NUM_TRANSACTIONS);
    for payment in &payments {
        assert_eq!(payment.status, PaymentStatus::Succeeded, "{payment}");
        assert!(payment.processed_at.is_some());
    }
    tear_down(api.ledger()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_deliveries_race() {
    let api = Arc::new(setup().await);
    let jobs = (0..8)
        .map(|_| {
            let api = Arc::clone(&api);
            tokio::spawn(async move { api.process_event(event("payment.succeeded", "dup_1", 5000)).await })
        })
        .collect::<Vec<_>>();
    let mut applied = 0;
    for job in jobs {
        if job.await.expect("reconciliation task panicked").is_applied() {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
    let payments = api.ledger().search_payments(PaymentQueryFilter::default()).await.unwrap();
    assert_eq!(payments.len(), 1);
    tear_down(api.ledger()).await;
}
