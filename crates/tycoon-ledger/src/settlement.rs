//! Monthly settlement of recurring expenses.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use tycoon_core::{AuditDraft, AuditEventType, BusinessId, Money, Result, TycoonError, UserId};
use tycoon_store::WriteBatch;

use crate::ledger::Ledger;
use crate::notify::Notifier;

/// What happened to one account during a settlement run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Deducted { amount: Money, budget: Money },
    Failed { amount: Money, budget: Money, shortfall: Money },
    /// No recurring expense configured.
    Skipped,
    /// The account could not be read or written; nothing was applied.
    Error { message: String },
}

/// Per-account line of a [`SettlementReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettlement {
    pub business_id: BusinessId,
    pub owners: Vec<UserId>,
    pub outcome: SettlementOutcome,
}

/// Aggregate result of one settlement run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    /// Sum of every expense actually collected.
    pub total: Money,
    pub settled: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub accounts: Vec<AccountSettlement>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Walks every owned business and collects its monthly expense.
///
/// Each account is settled under its own lock and in its own commit, so one
/// account's failure never affects another.
pub struct SettlementProcessor {
    ledger: Arc<Ledger>,
    notifier: Arc<dyn Notifier>,
}

impl SettlementProcessor {
    pub fn new(ledger: Arc<Ledger>, notifier: Arc<dyn Notifier>) -> Self {
        Self { ledger, notifier }
    }

    #[instrument(skip(self))]
    pub async fn run_monthly_settlement(&self) -> Result<SettlementReport> {
        let started_at = Utc::now();

        let mut owners: BTreeMap<BusinessId, Vec<UserId>> = BTreeMap::new();
        for user in self.ledger.store().list_users().await? {
            if let Some(business_id) = user.business_id {
                owners.entry(business_id).or_default().push(user.id);
            }
        }

        let mut report = SettlementReport {
            total: 0,
            settled: 0,
            failed: 0,
            skipped: 0,
            errors: 0,
            accounts: Vec::with_capacity(owners.len()),
            started_at,
            finished_at: started_at,
        };

        for (business_id, mut owner_ids) in owners {
            owner_ids.sort();
            let outcome = match self.settle_account(business_id, &owner_ids).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(business_id = %business_id, error = %err, "Settlement of account failed");
                    SettlementOutcome::Error {
                        message: err.to_string(),
                    }
                }
            };

            match &outcome {
                SettlementOutcome::Deducted { amount, .. } => {
                    report.total += amount;
                    report.settled += 1;
                }
                SettlementOutcome::Failed { .. } => report.failed += 1,
                SettlementOutcome::Skipped => report.skipped += 1,
                SettlementOutcome::Error { .. } => report.errors += 1,
            }
            report.accounts.push(AccountSettlement {
                business_id,
                owners: owner_ids,
                outcome,
            });
        }

        report.finished_at = Utc::now();
        info!(
            total = report.total,
            settled = report.settled,
            failed = report.failed,
            skipped = report.skipped,
            errors = report.errors,
            "Monthly settlement finished"
        );
        Ok(report)
    }

    async fn settle_account(&self, business_id: BusinessId, owners: &[UserId]) -> Result<SettlementOutcome> {
        let actor = owners
            .first()
            .copied()
            .ok_or_else(|| TycoonError::invalid(format!("business {} has no owner", business_id)))?;

        let _guard = self.ledger.lock_account(business_id).await;
        let business = self.ledger.business(business_id).await?;
        let amount = business.monthly_expense;
        if amount == 0 {
            return Ok(SettlementOutcome::Skipped);
        }

        match business.debited(amount) {
            Ok(updated) => {
                let draft = AuditDraft::new(
                    actor,
                    Some(business_id),
                    AuditEventType::ExpenseDeducted,
                    format!("monthly expense of {} deducted, budget now {}", amount, updated.budget),
                );
                self.ledger
                    .store()
                    .commit(WriteBatch::new().put_business(updated.clone()).record(draft))
                    .await?;

                for owner in owners {
                    self.notifier.notify_user(
                        *owner,
                        format!(
                            "Monthly expenses of {} were deducted from {}. Remaining budget: {}",
                            amount, updated.name, updated.budget
                        ),
                    );
                }
                Ok(SettlementOutcome::Deducted {
                    amount,
                    budget: updated.budget,
                })
            }
            Err(TycoonError::InsufficientFunds { available, .. }) => {
                let shortfall = amount - available;
                let draft = AuditDraft::new(
                    actor,
                    Some(business_id),
                    AuditEventType::ExpenseFailed,
                    format!(
                        "monthly expense of {} not deducted, budget {} short by {}",
                        amount, available, shortfall
                    ),
                );
                self.ledger.store().commit(WriteBatch::new().record(draft)).await?;

                warn!(business_id = %business_id, amount, available, "Monthly expense not covered");
                for owner in owners {
                    self.notifier.notify_user(
                        *owner,
                        format!(
                            "Monthly expenses of {} could not be deducted from {}: budget {} is short by {}",
                            amount, business.name, available, shortfall
                        ),
                    );
                }
                Ok(SettlementOutcome::Failed {
                    amount,
                    budget: available,
                    shortfall,
                })
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::BroadcastNotifier;
    use tycoon_core::{AuditFilter, Business, Recipient};
    use tycoon_store::{AccountStore, InMemoryAccountStore};

    async fn provision(store: &InMemoryAccountStore, owner: i64, budget: Money, expense: Money) -> BusinessId {
        let business = store
            .create_business(
                Business::builder()
                    .business_type("shop")
                    .budget(budget)
                    .monthly_expense(expense)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        store.ensure_user(UserId(owner)).await.unwrap();
        store.assign_business(UserId(owner), business.id).await.unwrap();
        business.id
    }

    #[tokio::test]
    async fn test_settlement_isolates_insolvent_accounts() {
        let store = Arc::new(InMemoryAccountStore::new());
        let a = provision(&store, 1, 500, 100).await;
        let b = provision(&store, 2, 300, 200).await;
        let c = provision(&store, 3, 50, 100).await;
        let idle = provision(&store, 4, 10, 0).await;
        // Unowned businesses are not settled.
        let unowned = store
            .create_business(Business::builder().business_type("shop").budget(1000).monthly_expense(10).build().unwrap())
            .await
            .unwrap();

        let notifier = Arc::new(BroadcastNotifier::default());
        let mut rx = notifier.subscribe();
        let ledger = Arc::new(Ledger::new(store.clone()));
        let processor = SettlementProcessor::new(ledger.clone(), notifier.clone());

        let report = processor.run_monthly_settlement().await.unwrap();
        assert_eq!(report.total, 300);
        assert_eq!((report.settled, report.failed, report.skipped, report.errors), (2, 1, 1, 0));

        let a = ledger.business(a).await.unwrap();
        assert_eq!((a.budget, a.cost), (400, 100));
        let b = ledger.business(b).await.unwrap();
        assert_eq!((b.budget, b.cost), (100, 200));
        let c_after = ledger.business(c).await.unwrap();
        assert_eq!((c_after.budget, c_after.cost), (50, 0));
        assert_eq!(ledger.business(idle).await.unwrap().budget, 10);
        assert_eq!(ledger.business(unowned.id).await.unwrap().budget, 1000);

        let failed = store
            .audit_events(&AuditFilter::event_type(AuditEventType::ExpenseFailed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].business_id, Some(c));

        let mut recipients = Vec::new();
        while let Ok(n) = rx.try_recv() {
            recipients.push(n.recipient);
        }
        assert_eq!(
            recipients,
            vec![
                Recipient::User(UserId(1)),
                Recipient::User(UserId(2)),
                Recipient::User(UserId(3)),
            ]
        );
    }

    #[tokio::test]
    async fn test_shared_business_is_debited_once() {
        let store = Arc::new(InMemoryAccountStore::new());
        let shared = provision(&store, 7, 500, 100).await;
        store.ensure_user(UserId(3)).await.unwrap();
        store.assign_business(UserId(3), shared).await.unwrap();

        let ledger = Arc::new(Ledger::new(store.clone()));
        let processor = SettlementProcessor::new(ledger.clone(), Arc::new(crate::notify::NullNotifier));
        let report = processor.run_monthly_settlement().await.unwrap();

        assert_eq!(report.total, 100);
        assert_eq!(report.accounts[0].owners, vec![UserId(3), UserId(7)]);
        assert_eq!(ledger.business(shared).await.unwrap().budget, 400);

        let events = store.audit_events(&AuditFilter::business(shared)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id, UserId(3));
    }

    #[tokio::test]
    async fn test_store_failure_does_not_abort_batch() {
        let store = Arc::new(InMemoryAccountStore::new());
        let first = provision(&store, 1, 500, 100).await;
        let second = provision(&store, 2, 500, 100).await;
        store.fail_next_commits(1);

        let ledger = Arc::new(Ledger::new(store.clone()));
        let processor = SettlementProcessor::new(ledger.clone(), Arc::new(crate::notify::NullNotifier));
        let report = processor.run_monthly_settlement().await.unwrap();

        assert_eq!(report.errors, 1);
        assert_eq!(report.settled, 1);
        assert_eq!(report.total, 100);
        assert_eq!(ledger.business(first).await.unwrap().budget, 500);
        assert_eq!(ledger.business(second).await.unwrap().budget, 400);
    }
}
