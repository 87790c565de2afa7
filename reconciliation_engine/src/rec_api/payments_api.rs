use std::fmt::Debug;

use log::trace;

use crate::{
    db_types::PaymentRecord,
    traits::{LedgerError, PaymentQueries, PaymentQueryFilter},
};

/// Read-only access to the ledger, for collaborators that list or display payments.
pub struct PaymentsApi<B> {
    db: B,
}

impl<B: Debug> Debug for PaymentsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentsApi ({:?})", self.db)
    }
}

impl<B> PaymentsApi<B>
where B: PaymentQueries
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetches the payment with the given ledger id. If no such payment exists, `None` is returned.
    pub async fn payment_by_id(&self, id: i64) -> Result<Option<PaymentRecord>, LedgerError> {
        self.db.fetch_payment(id).await
    }

    pub async fn search(&self, filter: PaymentQueryFilter) -> Result<Vec<PaymentRecord>, LedgerError> {
        trace!("🔎️ Searching payments. {filter}");
        self.db.search_payments(filter).await
    }
}
