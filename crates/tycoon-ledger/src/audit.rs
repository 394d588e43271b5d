//! Audit log queries and chain verification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use tycoon_core::audit::first_broken_link;
use tycoon_core::{AuditDraft, AuditEvent, AuditEventType, AuditFilter, BusinessId, Result, TycoonError, UserId};
use tycoon_store::{AccountStore, WriteBatch};

/// Result of walking the whole audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    /// Number of events in the log.
    pub length: usize,

    pub intact: bool,

    /// Sequence number of the first event whose link does not verify.
    pub first_broken: Option<u64>,
}

/// Read access to the append-only audit log, plus explicit logging.
pub struct AuditLog {
    store: Arc<dyn AccountStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Append a standalone event.
    pub async fn record(&self, draft: AuditDraft) -> Result<AuditEvent> {
        let receipt = self.store.commit(WriteBatch::new().record(draft)).await?;
        receipt
            .events
            .into_iter()
            .next()
            .ok_or_else(|| TycoonError::store("commit sealed no audit event"))
    }

    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        self.store.audit_events(filter).await
    }

    pub async fn for_business(&self, business_id: BusinessId) -> Result<Vec<AuditEvent>> {
        self.query(&AuditFilter::business(business_id)).await
    }

    pub async fn for_user(&self, user_id: UserId) -> Result<Vec<AuditEvent>> {
        self.query(&AuditFilter::user(user_id)).await
    }

    pub async fn of_type(&self, event_type: AuditEventType) -> Result<Vec<AuditEvent>> {
        self.query(&AuditFilter::event_type(event_type)).await
    }

    /// Re-derive every digest and check each link back to genesis.
    pub async fn verify(&self) -> Result<ChainReport> {
        let events = self.store.audit_events(&AuditFilter::default()).await?;
        let first_broken = first_broken_link(&events);
        if let Some(seq) = first_broken {
            warn!(seq, "Audit chain broken");
        }
        Ok(ChainReport {
            length: events.len(),
            intact: first_broken.is_none(),
            first_broken,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tycoon_core::Business;
    use tycoon_store::InMemoryAccountStore;

    #[tokio::test]
    async fn test_record_and_query() {
        let store = Arc::new(InMemoryAccountStore::new());
        let business = store
            .create_business(Business::builder().business_type("farm").build().unwrap())
            .await
            .unwrap();
        store.ensure_user(UserId(5)).await.unwrap();
        let log = AuditLog::new(store);

        let event = log
            .record(AuditDraft::new(
                UserId(5),
                Some(business.id),
                AuditEventType::MakeOrder,
                "ordered seeds",
            ))
            .await
            .unwrap();
        assert_eq!(event.seq, 1);

        assert_eq!(log.for_business(business.id).await.unwrap().len(), 1);
        assert_eq!(log.for_user(UserId(5)).await.unwrap().len(), 1);
        assert!(log.of_type(AuditEventType::Credit).await.unwrap().is_empty());

        let report = log.verify().await.unwrap();
        assert_eq!(report.length, 1);
        assert!(report.intact);
    }
}
