//! Read-only catalog browsing.

use std::sync::Arc;

use tycoon_core::{Category, CategoryId, Item, ItemId, Result, Subcategory, SubcategoryId, TycoonError};
use tycoon_store::AccountStore;

/// Category → subcategory → item navigation.
pub struct Catalog {
    store: Arc<dyn AccountStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.store.list_categories().await
    }

    pub async fn subcategories(&self, category_id: CategoryId) -> Result<Vec<Subcategory>> {
        self.store.list_subcategories(category_id).await
    }

    pub async fn items(&self, subcategory_id: SubcategoryId) -> Result<Vec<Item>> {
        self.store.list_items(subcategory_id).await
    }

    pub async fn item(&self, id: ItemId) -> Result<Item> {
        self.store
            .get_item(id)
            .await?
            .ok_or_else(|| TycoonError::not_found(ItemId::LABEL, id))
    }
}
