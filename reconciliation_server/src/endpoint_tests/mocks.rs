use mockall::mock;
use reconciliation_engine::{
    db_types::{AuditEntry, NewAuditEntry, NewPaymentRecord, PaymentRecord, PaymentStatus, PaymentUpdate},
    traits::{
        AuditError,
        AuditQueryFilter,
        AuditSink,
        LedgerError,
        LedgerRepository,
        PaymentQueries,
        PaymentQueryFilter,
    },
};

mock! {
    pub Backend {}
    impl LedgerRepository for Backend {
        async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PaymentRecord>, LedgerError>;
        async fn find_by_metadata_reference(&self, reference: &str) -> Result<Vec<PaymentRecord>, LedgerError>;
        async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord, LedgerError>;
        async fn update_conditional(&self, id: i64, expected: PaymentStatus, update: PaymentUpdate) -> Result<PaymentRecord, LedgerError>;
    }
    impl PaymentQueries for Backend {
        async fn fetch_payment(&self, id: i64) -> Result<Option<PaymentRecord>, LedgerError>;
        async fn search_payments(&self, filter: PaymentQueryFilter) -> Result<Vec<PaymentRecord>, LedgerError>;
    }
    impl AuditSink for Backend {
        async fn record(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError>;
        async fn fetch_entries(&self, filter: AuditQueryFilter) -> Result<Vec<AuditEntry>, AuditError>;
    }
}
