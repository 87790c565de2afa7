use std::fmt::Debug;

use crate::{
    db_types::AuditEntry,
    traits::{AuditError, AuditQueryFilter, AuditSink},
};

/// Read access to the audit log. This is where a replay job finds the events that were acknowledged but not applied.
pub struct AuditApi<B> {
    db: B,
}

impl<B: Debug> Debug for AuditApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuditApi ({:?})", self.db)
    }
}

impl<B> AuditApi<B>
where B: AuditSink
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn entries(&self, filter: AuditQueryFilter) -> Result<Vec<AuditEntry>, AuditError> {
        self.db.fetch_entries(filter).await
    }
}
