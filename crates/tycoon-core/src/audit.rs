//! Audit events.
//!
//! Callers stage an [`AuditDraft`] next to the ledger mutation it describes; the
//! store seals it into an [`AuditEvent`] inside the same commit, assigning the
//! sequence number and chaining a SHA-256 digest to the previous event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::types::{BusinessId, UserId};

/// Digest that precedes the first event of a log.
pub const GENESIS_DIGEST: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Kinds of ledger-affecting events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditEventType {
    /// Administrative credit.
    Credit,
    /// Administrative debit.
    Debit,
    /// Debit rejected for insufficient funds.
    DebitFailed,
    /// Monthly expense collected by settlement.
    ExpenseDeducted,
    /// Monthly expense could not be collected.
    ExpenseFailed,
    /// Recurring expense changed.
    ExpenseUpdated,
    /// Outgoing leg of a transfer.
    TransferOut,
    /// Incoming leg of a transfer.
    TransferIn,
    /// Business renamed at registration.
    RenameBusiness,
    /// Checkout completed.
    MakeOrder,
    /// Bulk catalog price change.
    PriceAdjustment,
}

impl AuditEventType {
    /// Stable wire name, e.g. `expense-failed`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Credit => "credit",
            AuditEventType::Debit => "debit",
            AuditEventType::DebitFailed => "debit-failed",
            AuditEventType::ExpenseDeducted => "expense-deducted",
            AuditEventType::ExpenseFailed => "expense-failed",
            AuditEventType::ExpenseUpdated => "expense-updated",
            AuditEventType::TransferOut => "transfer-out",
            AuditEventType::TransferIn => "transfer-in",
            AuditEventType::RenameBusiness => "rename-business",
            AuditEventType::MakeOrder => "make-order",
            AuditEventType::PriceAdjustment => "price-adjustment",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        const ALL: [AuditEventType; 11] = [
            AuditEventType::Credit,
            AuditEventType::Debit,
            AuditEventType::DebitFailed,
            AuditEventType::ExpenseDeducted,
            AuditEventType::ExpenseFailed,
            AuditEventType::ExpenseUpdated,
            AuditEventType::TransferOut,
            AuditEventType::TransferIn,
            AuditEventType::RenameBusiness,
            AuditEventType::MakeOrder,
            AuditEventType::PriceAdjustment,
        ];
        ALL.into_iter().find(|t| t.as_str() == raw)
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An audit record that has not been committed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDraft {
    pub user_id: UserId,
    pub business_id: Option<BusinessId>,
    pub event_type: AuditEventType,
    pub description: String,
}

impl AuditDraft {
    pub fn new(
        user_id: UserId,
        business_id: Option<BusinessId>,
        event_type: AuditEventType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            business_id,
            event_type,
            description: description.into(),
        }
    }
}

/// Immutable, append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier for this event.
    pub id: Uuid,

    /// Position in the log, starting at 1.
    pub seq: u64,

    /// Acting user.
    pub user_id: UserId,

    /// Affected business, if any.
    pub business_id: Option<BusinessId>,

    pub event_type: AuditEventType,

    pub description: String,

    pub timestamp: DateTime<Utc>,

    /// Digest of the preceding event (genesis digest for the first).
    pub prev_digest: String,

    /// Digest over this event's content and `prev_digest`.
    pub digest: String,
}

impl AuditEvent {
    /// Seal a draft at position `seq` after `prev_digest`.
    pub fn seal(draft: AuditDraft, seq: u64, prev_digest: &str, timestamp: DateTime<Utc>) -> Self {
        let mut event = Self {
            id: Uuid::new_v4(),
            seq,
            user_id: draft.user_id,
            business_id: draft.business_id,
            event_type: draft.event_type,
            description: draft.description,
            timestamp,
            prev_digest: prev_digest.to_string(),
            digest: String::new(),
        };
        event.digest = event.compute_digest();
        event
    }

    /// Digest over the event content chained to `prev_digest`.
    pub fn compute_digest(&self) -> String {
        let content = serde_json::json!({
            "id": self.id,
            "seq": self.seq,
            "user_id": self.user_id,
            "business_id": self.business_id,
            "event_type": self.event_type,
            "description": self.description,
            "timestamp": self.timestamp,
        });

        let mut hasher = Sha256::new();
        hasher.update(self.prev_digest.as_bytes());
        hasher.update(content.to_string().as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Returns the sequence number of the first event that breaks the chain.
///
/// `events` must be the complete log in sequence order.
pub fn first_broken_link(events: &[AuditEvent]) -> Option<u64> {
    let mut expected_prev = GENESIS_DIGEST.to_string();

    for (idx, event) in events.iter().enumerate() {
        let expected_seq = idx as u64 + 1;
        if event.seq != expected_seq
            || event.prev_digest != expected_prev
            || event.digest != event.compute_digest()
        {
            return Some(event.seq);
        }
        expected_prev = event.digest.clone();
    }

    None
}

/// Verify that `events` forms an unbroken chain from genesis.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    first_broken_link(events).is_none()
}

/// Filter for audit queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub business_id: Option<BusinessId>,
    pub user_id: Option<UserId>,
    pub event_type: Option<AuditEventType>,

    /// Keep only the most recent `limit` matches.
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn business(business_id: BusinessId) -> Self {
        Self {
            business_id: Some(business_id),
            ..Default::default()
        }
    }

    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn event_type(event_type: AuditEventType) -> Self {
        Self {
            event_type: Some(event_type),
            ..Default::default()
        }
    }

    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(business_id) = self.business_id {
            if event.business_id != Some(business_id) {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if event.user_id != user_id {
                return false;
            }
        }
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }
        true
    }

    /// Apply the filter to a log in sequence order.
    pub fn apply<'a>(&self, events: impl IntoIterator<Item = &'a AuditEvent>) -> Vec<AuditEvent> {
        let mut matched: Vec<AuditEvent> = events
            .into_iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect();
        if let Some(limit) = self.limit {
            let skip = matched.len().saturating_sub(limit);
            matched.drain(..skip);
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        let mut prev = GENESIS_DIGEST.to_string();
        for i in 0..n {
            let draft = AuditDraft::new(
                UserId(1),
                Some(BusinessId(i as i64 % 2)),
                AuditEventType::Credit,
                format!("credit #{}", i),
            );
            let event = AuditEvent::seal(draft, i as u64 + 1, &prev, Utc::now());
            prev = event.digest.clone();
            events.push(event);
        }
        events
    }

    #[test]
    fn test_chain_verifies() {
        let events = chain(5);
        assert!(verify_chain(&events));
        assert!(verify_chain(&[]));
    }

    #[test]
    fn test_tampering_detected() {
        let mut events = chain(4);
        events[2].description = "credit #999".to_string();
        assert_eq!(first_broken_link(&events), Some(3));
    }

    #[test]
    fn test_gap_detected() {
        let mut events = chain(4);
        events.remove(1);
        assert_eq!(first_broken_link(&events), Some(3));
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(AuditEventType::ExpenseFailed.as_str(), "expense-failed");
        assert_eq!(
            AuditEventType::parse("expense-deducted"),
            Some(AuditEventType::ExpenseDeducted)
        );
        let json = serde_json::to_string(&AuditEventType::TransferOut).unwrap();
        assert_eq!(json, "\"transfer-out\"");
    }

    #[test]
    fn test_filter_with_limit() {
        let events = chain(6);
        let filter = AuditFilter {
            business_id: Some(BusinessId(1)),
            limit: Some(2),
            ..Default::default()
        };
        let matched = filter.apply(&events);
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].seq, 4);
        assert_eq!(matched[1].seq, 6);
    }
}
