//! Initial provisioning of businesses and the catalog from a JSON file.
//!
//! ```json
//! {
//!   "businesses": [{"business_type": "courier", "name": "Courier", "budget": 1000, "monthly_expense": 100}],
//!   "catalog": [{"name": "Office", "subcategories": [{"name": "Paper", "items": [{"name": "Ream", "price": 20, "weight": 2}]}]}]
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;
use tycoon_core::{Money, NewBusiness, NewItem, Result};
use tycoon_store::AccountStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub businesses: Vec<NewBusiness>,
    #[serde(default)]
    pub catalog: Vec<SeedCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub subcategories: Vec<SeedSubcategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSubcategory {
    pub name: String,
    #[serde(default)]
    pub items: Vec<SeedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedItem {
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub weight: i64,
}

/// What a seed run provisioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub businesses: usize,
    pub categories: usize,
    pub subcategories: usize,
    pub items: usize,
}

impl Seed {
    /// Read a seed file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse seed file {}", path.display()))
    }

    /// Provision everything, unless the store already holds businesses or
    /// categories.
    pub async fn apply(&self, store: &dyn AccountStore) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();
        if !store.list_businesses().await?.is_empty() || !store.list_categories().await?.is_empty() {
            info!("Store already provisioned, skipping seed");
            return Ok(summary);
        }

        for business in &self.businesses {
            store.create_business(business.clone()).await?;
            summary.businesses += 1;
        }

        for category in &self.catalog {
            let created = store.create_category(&category.name).await?;
            summary.categories += 1;
            for subcategory in &category.subcategories {
                let sub = store.create_subcategory(created.id, &subcategory.name).await?;
                summary.subcategories += 1;
                for item in &subcategory.items {
                    store
                        .create_item(NewItem {
                            name: item.name.clone(),
                            price: item.price,
                            weight: item.weight,
                            subcategory_id: sub.id,
                        })
                        .await?;
                    summary.items += 1;
                }
            }
        }

        info!(
            businesses = summary.businesses,
            categories = summary.categories,
            items = summary.items,
            "Seed applied"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use tycoon_store::InMemoryAccountStore;

    use super::*;

    const SEED: &str = r#"{
        "businesses": [
            {"business_type": "courier", "name": "Courier", "budget": 1000, "monthly_expense": 100},
            {"business_type": "factory", "name": "Factory"}
        ],
        "catalog": [
            {"name": "Office", "subcategories": [
                {"name": "Paper", "items": [
                    {"name": "Ream", "price": 20, "weight": 2},
                    {"name": "Folder", "price": 15}
                ]}
            ]}
        ]
    }"#;

    #[tokio::test]
    async fn test_seed_provisions_once() {
        let seed: Seed = serde_json::from_str(SEED).unwrap();
        let store = InMemoryAccountStore::new();

        let summary = seed.apply(&store).await.unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                businesses: 2,
                categories: 1,
                subcategories: 1,
                items: 2
            }
        );
        let businesses = store.list_businesses().await.unwrap();
        assert_eq!(businesses[0].budget, 1000);
        assert_eq!(businesses[1].budget, 0);
        assert_eq!(store.list_all_items().await.unwrap()[1].weight, 0);

        // A second run leaves the store alone.
        assert_eq!(seed.apply(&store).await.unwrap(), SeedSummary::default());
        assert_eq!(store.list_businesses().await.unwrap().len(), 2);
    }
}
