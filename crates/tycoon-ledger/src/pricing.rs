//! Bulk catalog price adjustment.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use tycoon_core::{AuditDraft, AuditEventType, Result, TycoonError, UserId};
use tycoon_store::{AccountStore, WriteBatch};

/// Summary of one adjustment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceAdjustment {
    pub pct: i64,
    /// Number of items rewritten.
    pub adjusted: usize,
}

/// Read-all, mutate-all, commit-all over the item catalog.
pub struct CatalogPricing {
    store: Arc<dyn AccountStore>,
}

impl CatalogPricing {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Scale every price by `(100 + pct) / 100`, truncating toward zero.
    ///
    /// Returns the number of items adjusted.
    #[instrument(skip(self))]
    pub async fn apply_percentage_adjustment(&self, pct: i64) -> Result<usize> {
        self.adjust(None, pct).await
    }

    /// Adjust and append one `price-adjustment` event in the same commit.
    #[instrument(skip(self))]
    pub async fn apply_percentage_adjustment_recorded(&self, actor: UserId, pct: i64) -> Result<PriceAdjustment> {
        let adjusted = self.adjust(Some(actor), pct).await?;
        Ok(PriceAdjustment { pct, adjusted })
    }

    async fn adjust(&self, actor: Option<UserId>, pct: i64) -> Result<usize> {
        if pct < -100 {
            return Err(TycoonError::invalid(format!(
                "price adjustment must be at least -100%, got {}%",
                pct
            )));
        }

        let items = self.store.list_all_items().await?;
        let count = items.len();
        let mut batch = WriteBatch::new();
        for item in items {
            batch = batch.put_item(item.adjusted(pct)?);
        }
        if let Some(actor) = actor {
            batch = batch.record(AuditDraft::new(
                actor,
                None,
                AuditEventType::PriceAdjustment,
                format!("adjusted {} item prices by {}%", count, pct),
            ));
        }
        self.store.commit(batch).await?;

        info!(pct, count, "Catalog prices adjusted");
        Ok(count)
    }
}
