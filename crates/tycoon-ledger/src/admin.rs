//! Privileged operations gated by an external authorization check.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, instrument, warn};
use tycoon_core::{AuditEvent, AuditFilter, Business, BusinessId, Money, Result, TycoonError, UserId};

use crate::audit::{AuditLog, ChainReport};
use crate::ledger::Ledger;
use crate::notify::Notifier;
use crate::pricing::{CatalogPricing, PriceAdjustment};
use crate::report::BudgetReport;
use crate::settlement::{SettlementProcessor, SettlementReport};

/// Decides whether a user may run privileged operations.
pub trait Authorizer: Send + Sync {
    fn is_admin(&self, user_id: UserId) -> bool;

    fn authorize(&self, user_id: UserId) -> Result<()> {
        if self.is_admin(user_id) {
            Ok(())
        } else {
            Err(TycoonError::Unauthorized { user_id })
        }
    }
}

/// A fixed set of administrator identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminSet {
    ids: BTreeSet<UserId>,
}

impl AdminSet {
    pub fn new(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Parse a comma-separated list such as `"12, 40"`. Blank entries are ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<UserId>)
            .collect::<Result<BTreeSet<_>>>()
            .map(|ids| Self { ids })
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.ids.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Authorizer for AdminSet {
    fn is_admin(&self, user_id: UserId) -> bool {
        self.contains(user_id)
    }
}

/// The administrative override surface: privileged variants of the ledger,
/// settlement and pricing operations.
pub struct AdminConsole {
    authorizer: Arc<dyn Authorizer>,
    ledger: Arc<Ledger>,
    settlement: Arc<SettlementProcessor>,
    pricing: Arc<CatalogPricing>,
    audit: Arc<AuditLog>,
    notifier: Arc<dyn Notifier>,
}

impl AdminConsole {
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        ledger: Arc<Ledger>,
        settlement: Arc<SettlementProcessor>,
        pricing: Arc<CatalogPricing>,
        audit: Arc<AuditLog>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            authorizer,
            ledger,
            settlement,
            pricing,
            audit,
            notifier,
        }
    }

    /// Authorize `admin` and make sure it can appear as an audit actor.
    async fn admit(&self, admin: UserId) -> Result<()> {
        if let Err(err) = self.authorizer.authorize(admin) {
            warn!(user_id = %admin, "Rejected privileged operation");
            return Err(err);
        }
        self.ledger.store().ensure_user(admin).await?;
        Ok(())
    }

    /// Fire-and-forget: the mutation is already committed when this runs.
    async fn notify_owners(&self, business_id: BusinessId, text: String) {
        match self.ledger.store().owners_of(business_id).await {
            Ok(owners) => {
                for owner in owners {
                    self.notifier.notify_user(owner.id, text.clone());
                }
            }
            Err(err) => warn!(business_id = %business_id, error = %err, "Could not resolve owners to notify"),
        }
    }

    #[instrument(skip(self))]
    pub async fn credit(&self, admin: UserId, business_id: BusinessId, amount: Money) -> Result<Business> {
        self.admit(admin).await?;
        let business = self.ledger.credit_recorded(admin, business_id, amount).await?;
        self.notify_owners(
            business_id,
            format!(
                "Your company received {}. New balance: {}",
                amount, business.budget
            ),
        )
        .await;
        Ok(business)
    }

    #[instrument(skip(self))]
    pub async fn debit(&self, admin: UserId, business_id: BusinessId, amount: Money) -> Result<Business> {
        self.admit(admin).await?;
        let business = self.ledger.debit_recorded(admin, business_id, amount).await?;
        self.notify_owners(
            business_id,
            format!("{} was debited from your company. New balance: {}", amount, business.budget),
        )
        .await;
        Ok(business)
    }

    #[instrument(skip(self))]
    pub async fn set_monthly_expense(&self, admin: UserId, business_id: BusinessId, amount: Money) -> Result<Business> {
        self.admit(admin).await?;
        self.ledger
            .set_monthly_expense_recorded(admin, business_id, amount)
            .await
    }

    #[instrument(skip(self))]
    pub async fn run_settlement(&self, admin: UserId) -> Result<SettlementReport> {
        self.admit(admin).await?;
        info!(user_id = %admin, "Settlement triggered by admin");
        self.settlement.run_monthly_settlement().await
    }

    #[instrument(skip(self))]
    pub async fn apply_inflation(&self, admin: UserId, pct: i64) -> Result<PriceAdjustment> {
        self.admit(admin).await?;
        self.pricing.apply_percentage_adjustment_recorded(admin, pct).await
    }

    pub async fn budget_report(&self, admin: UserId) -> Result<BudgetReport> {
        self.admit(admin).await?;
        BudgetReport::build(self.ledger.store().as_ref()).await
    }

    pub async fn audit_events(&self, admin: UserId, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        self.admit(admin).await?;
        self.audit.query(filter).await
    }

    pub async fn verify_audit(&self, admin: UserId) -> Result<ChainReport> {
        self.admit(admin).await?;
        self.audit.verify().await
    }
}
