//! Invariant-checked balance mutations.
//!
//! Every mutation runs under the per-account lock of each account it touches
//! and is persisted as one [`WriteBatch`], so a failed commit leaves every
//! account exactly as it was.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};
use tycoon_core::{
    ensure_positive, AuditDraft, AuditEventType, Business, BusinessId, Money, Result, TycoonError,
    UserId,
};
use tycoon_store::{AccountStore, CommitReceipt, WriteBatch};

use crate::locks::LockTable;

/// Both sides of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub from: Business,
    pub to: Business,
    pub amount: Money,
}

/// The ledger over an [`AccountStore`].
pub struct Ledger {
    store: Arc<dyn AccountStore>,
    accounts: LockTable<BusinessId>,
}

impl Ledger {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            store,
            accounts: LockTable::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Resolve a business or fail with `NotFound`.
    pub async fn business(&self, id: BusinessId) -> Result<Business> {
        self.store
            .get_business(id)
            .await?
            .ok_or_else(|| TycoonError::not_found(BusinessId::LABEL, id))
    }

    /// Hold the account lock of `id` until the guard is dropped.
    pub(crate) async fn lock_account(&self, id: BusinessId) -> OwnedMutexGuard<()> {
        self.accounts.lock(id).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt> {
        self.store.commit(batch).await.map_err(|err| {
            warn!(error = %err, "Ledger commit failed");
            err
        })
    }

    /// Increase budget and income by `amount`.
    #[instrument(skip(self))]
    pub async fn credit(&self, id: BusinessId, amount: Money) -> Result<Business> {
        ensure_positive(amount, "credit amount")?;
        let _guard = self.lock_account(id).await;

        let updated = self.business(id).await?.credited(amount)?;
        self.commit(WriteBatch::new().put_business(updated.clone()))
            .await?;

        debug!(business_id = %id, amount, budget = updated.budget, "Credited");
        Ok(updated)
    }

    /// Decrease budget by `amount` and add it to cost.
    ///
    /// Nothing is written when the budget does not cover the amount.
    #[instrument(skip(self))]
    pub async fn debit(&self, id: BusinessId, amount: Money) -> Result<Business> {
        ensure_positive(amount, "debit amount")?;
        let _guard = self.lock_account(id).await;

        let updated = self.business(id).await?.debited(amount)?;
        self.commit(WriteBatch::new().put_business(updated.clone()))
            .await?;

        debug!(business_id = %id, amount, budget = updated.budget, "Debited");
        Ok(updated)
    }

    /// Credit and append one `credit` audit event in the same commit.
    #[instrument(skip(self))]
    pub async fn credit_recorded(&self, actor: UserId, id: BusinessId, amount: Money) -> Result<Business> {
        ensure_positive(amount, "credit amount")?;
        let _guard = self.lock_account(id).await;

        let updated = self.business(id).await?.credited(amount)?;
        let draft = AuditDraft::new(
            actor,
            Some(id),
            AuditEventType::Credit,
            format!("credited {}, budget now {}", amount, updated.budget),
        );
        self.commit(WriteBatch::new().put_business(updated.clone()).record(draft))
            .await?;

        info!(business_id = %id, amount, budget = updated.budget, "Credited");
        Ok(updated)
    }

    /// Debit and append one `debit` audit event in the same commit.
    ///
    /// An insufficient budget appends a `debit-failed` event instead and
    /// returns `InsufficientFunds`.
    #[instrument(skip(self))]
    pub async fn debit_recorded(&self, actor: UserId, id: BusinessId, amount: Money) -> Result<Business> {
        ensure_positive(amount, "debit amount")?;
        let _guard = self.lock_account(id).await;

        let business = self.business(id).await?;
        match business.debited(amount) {
            Ok(updated) => {
                let draft = AuditDraft::new(
                    actor,
                    Some(id),
                    AuditEventType::Debit,
                    format!("debited {}, budget now {}", amount, updated.budget),
                );
                self.commit(WriteBatch::new().put_business(updated.clone()).record(draft))
                    .await?;
                info!(business_id = %id, amount, budget = updated.budget, "Debited");
                Ok(updated)
            }
            Err(err @ TycoonError::InsufficientFunds { .. }) => {
                let draft = AuditDraft::new(
                    actor,
                    Some(id),
                    AuditEventType::DebitFailed,
                    format!(
                        "debit of {} rejected, budget {} short by {}",
                        amount,
                        business.budget,
                        amount - business.budget
                    ),
                );
                self.commit(WriteBatch::new().record(draft)).await?;
                warn!(business_id = %id, amount, budget = business.budget, "Debit rejected");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Move `amount` from one account to another as a single unit.
    #[instrument(skip(self))]
    pub async fn transfer(&self, from: BusinessId, to: BusinessId, amount: Money) -> Result<TransferReceipt> {
        self.transfer_inner(None, from, to, amount).await
    }

    /// Transfer and append a `transfer-out` and a `transfer-in` event in the
    /// same commit.
    #[instrument(skip(self))]
    pub async fn transfer_recorded(
        &self,
        actor: UserId,
        from: BusinessId,
        to: BusinessId,
        amount: Money,
    ) -> Result<TransferReceipt> {
        self.transfer_inner(Some(actor), from, to, amount).await
    }

    async fn transfer_inner(
        &self,
        actor: Option<UserId>,
        from: BusinessId,
        to: BusinessId,
        amount: Money,
    ) -> Result<TransferReceipt> {
        ensure_positive(amount, "transfer amount")?;
        if from == to {
            return Err(TycoonError::invalid(format!(
                "cannot transfer from business {} to itself",
                from
            )));
        }

        let _guard = self.accounts.lock_pair(from, to).await;

        let source = self.business(from).await?;
        let target = self.business(to).await?;
        let source = source.debited(amount)?;
        let target = target.credited(amount)?;

        let mut batch = WriteBatch::new()
            .put_business(source.clone())
            .put_business(target.clone());
        if let Some(actor) = actor {
            batch = batch
                .record(AuditDraft::new(
                    actor,
                    Some(from),
                    AuditEventType::TransferOut,
                    format!("sent {} to {} ({})", amount, target.name, to),
                ))
                .record(AuditDraft::new(
                    actor,
                    Some(to),
                    AuditEventType::TransferIn,
                    format!("received {} from {} ({})", amount, source.name, from),
                ));
        }
        self.commit(batch).await?;

        info!(from = %from, to = %to, amount, "Transfer settled");
        Ok(TransferReceipt {
            from: source,
            to: target,
            amount,
        })
    }

    /// Replace the recurring expense. The budget is untouched.
    #[instrument(skip(self))]
    pub async fn set_monthly_expense(&self, id: BusinessId, amount: Money) -> Result<Business> {
        let _guard = self.lock_account(id).await;
        let updated = self.business(id).await?.with_monthly_expense(amount)?;
        self.commit(WriteBatch::new().put_business(updated.clone()))
            .await?;
        Ok(updated)
    }

    /// Set the recurring expense and append an `expense-updated` event.
    #[instrument(skip(self))]
    pub async fn set_monthly_expense_recorded(
        &self,
        actor: UserId,
        id: BusinessId,
        amount: Money,
    ) -> Result<Business> {
        let _guard = self.lock_account(id).await;
        let current = self.business(id).await?;
        let updated = current.with_monthly_expense(amount)?;
        let draft = AuditDraft::new(
            actor,
            Some(id),
            AuditEventType::ExpenseUpdated,
            format!(
                "monthly expense changed from {} to {}",
                current.monthly_expense, amount
            ),
        );
        self.commit(WriteBatch::new().put_business(updated.clone()).record(draft))
            .await?;

        info!(business_id = %id, amount, "Monthly expense updated");
        Ok(updated)
    }

    /// Rename a business. Renaming to the current name is a no-op write.
    #[instrument(skip(self))]
    pub async fn rename_business(&self, id: BusinessId, name: &str) -> Result<Business> {
        let _guard = self.lock_account(id).await;
        let updated = self.business(id).await?.renamed(name)?;
        self.commit(WriteBatch::new().put_business(updated.clone()))
            .await?;
        Ok(updated)
    }

    /// Rename and append a `rename-business` event.
    #[instrument(skip(self))]
    pub async fn rename_business_recorded(&self, actor: UserId, id: BusinessId, name: &str) -> Result<Business> {
        let _guard = self.lock_account(id).await;
        let current = self.business(id).await?;
        let updated = current.renamed(name)?;
        let draft = AuditDraft::new(
            actor,
            Some(id),
            AuditEventType::RenameBusiness,
            format!("renamed '{}' to '{}'", current.name, updated.name),
        );
        self.commit(WriteBatch::new().put_business(updated.clone()).record(draft))
            .await?;
        Ok(updated)
    }
}
