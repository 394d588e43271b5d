//! Atomic write batches.

use serde::{Deserialize, Serialize};
use tycoon_core::{AuditDraft, AuditEvent, Business, Item, UserId};

/// A set of row writes that a store applies all together or not at all.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    businesses: Vec<Business>,
    items: Vec<Item>,
    audit: Vec<AuditDraft>,
    cleared_carts: Vec<UserId>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a business row. The row must already exist.
    pub fn put_business(mut self, business: Business) -> Self {
        self.businesses.push(business);
        self
    }

    /// Overwrite an item row. The row must already exist.
    pub fn put_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    /// Append an audit event, sealed by the store at commit.
    pub fn record(mut self, draft: AuditDraft) -> Self {
        self.audit.push(draft);
        self
    }

    /// Remove every cart line of `user_id`.
    pub fn clear_cart(mut self, user_id: UserId) -> Self {
        self.cleared_carts.push(user_id);
        self
    }

    pub fn businesses(&self) -> &[Business] {
        &self.businesses
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn audit(&self) -> &[AuditDraft] {
        &self.audit
    }

    pub fn cleared_carts(&self) -> &[UserId] {
        &self.cleared_carts
    }

    pub fn is_empty(&self) -> bool {
        self.businesses.is_empty()
            && self.items.is_empty()
            && self.audit.is_empty()
            && self.cleared_carts.is_empty()
    }

    /// Decompose into its parts.
    pub fn into_parts(self) -> (Vec<Business>, Vec<Item>, Vec<AuditDraft>, Vec<UserId>) {
        (self.businesses, self.items, self.audit, self.cleared_carts)
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Store version after the commit.
    pub version: u64,

    /// Audit events sealed by this commit, in order.
    pub events: Vec<AuditEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tycoon_core::{AuditEventType, BusinessId};

    #[test]
    fn test_batch_builder() {
        let batch = WriteBatch::new()
            .record(AuditDraft::new(
                UserId(1),
                Some(BusinessId(2)),
                AuditEventType::Credit,
                "credit 10",
            ))
            .clear_cart(UserId(1));

        assert!(!batch.is_empty());
        assert_eq!(batch.audit().len(), 1);
        assert_eq!(batch.cleared_carts(), &[UserId(1)]);
        assert!(WriteBatch::new().is_empty());
    }
}
