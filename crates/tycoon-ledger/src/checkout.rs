//! Cart building and atomic checkout.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use tycoon_core::{
    AuditDraft, AuditEvent, AuditEventType, Business, CartLine, CartSummary, Item, ItemId, Result,
    TycoonError, UserId,
};
use tycoon_store::WriteBatch;

use crate::ledger::Ledger;
use crate::locks::LockTable;
use crate::notify::Notifier;

/// Outcome of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    /// The buyer's account after the debit.
    pub business: Business,
    pub summary: CartSummary,
    pub event: AuditEvent,
}

/// Carts and checkout against the buyer's account.
///
/// A per-user cart lock keeps additions from racing a checkout of the same
/// cart.
pub struct Checkout {
    ledger: Arc<Ledger>,
    notifier: Arc<dyn Notifier>,
    carts: LockTable<UserId>,
}

impl Checkout {
    pub fn new(ledger: Arc<Ledger>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ledger,
            notifier,
            carts: LockTable::new(),
        }
    }

    /// Add `quantity` of an item, accumulating onto an existing line.
    #[instrument(skip(self))]
    pub async fn add_to_cart(&self, user_id: UserId, item_id: ItemId, quantity: i64) -> Result<CartLine> {
        let _guard = self.carts.lock(user_id).await;
        self.ledger.store().add_to_cart(user_id, item_id, quantity).await
    }

    /// The cart priced at current catalog prices.
    pub async fn view_cart(&self, user_id: UserId) -> Result<CartSummary> {
        let lines = self.ledger.store().cart(user_id).await?;
        self.price(user_id, &lines).await
    }

    async fn price(&self, user_id: UserId, lines: &[CartLine]) -> Result<CartSummary> {
        let mut items: HashMap<ItemId, Item> = HashMap::with_capacity(lines.len());
        for line in lines {
            if items.contains_key(&line.item_id) {
                continue;
            }
            let item = self
                .ledger
                .store()
                .get_item(line.item_id)
                .await?
                .ok_or_else(|| TycoonError::not_found(ItemId::LABEL, line.item_id))?;
            items.insert(item.id, item);
        }
        CartSummary::price(user_id, lines, &items)
    }

    /// Debit the cart total from the buyer's business, record the order and
    /// clear the cart, all in one commit.
    ///
    /// On any error the budget and the cart are left untouched.
    #[instrument(skip(self))]
    pub async fn checkout(&self, user_id: UserId) -> Result<CheckoutReceipt> {
        let _cart_guard = self.carts.lock(user_id).await;

        let business_id = self
            .ledger
            .store()
            .get_user(user_id)
            .await?
            .and_then(|user| user.business_id)
            .ok_or(TycoonError::NoBusiness { user_id })?;

        let lines = self.ledger.store().cart(user_id).await?;
        if lines.is_empty() {
            return Err(TycoonError::EmptyCart { user_id });
        }
        let summary = self.price(user_id, &lines).await?;

        let _account_guard = self.ledger.lock_account(business_id).await;
        let business = self.ledger.business(business_id).await?;
        let updated = if summary.total > 0 {
            business.debited(summary.total)?
        } else {
            business
        };

        let items: Vec<String> = summary
            .lines
            .iter()
            .map(|line| format!("{} x{}", line.item.name, line.quantity))
            .collect();
        let draft = AuditDraft::new(
            user_id,
            Some(business_id),
            AuditEventType::MakeOrder,
            format!("order for {}: {}", summary.total, items.join(", ")),
        );

        let mut batch = WriteBatch::new().record(draft).clear_cart(user_id);
        if summary.total > 0 {
            batch = batch.put_business(updated.clone());
        }
        let receipt = self.ledger.store().commit(batch).await?;
        let event = receipt
            .events
            .into_iter()
            .next()
            .ok_or_else(|| TycoonError::store("commit sealed no audit event"))?;

        info!(user_id = %user_id, business_id = %business_id, total = summary.total, "Order placed");
        self.notifier.announce(format!(
            "{} placed an order for {}",
            updated.name, summary.total
        ));

        Ok(CheckoutReceipt {
            business: updated,
            summary,
            event,
        })
    }

    /// Empty the cart. No ledger effect.
    #[instrument(skip(self))]
    pub async fn cancel_checkout(&self, user_id: UserId) -> Result<()> {
        let _guard = self.carts.lock(user_id).await;
        self.ledger.store().clear_cart(user_id).await
    }
}
