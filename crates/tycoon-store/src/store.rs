//! Account store trait and the in-memory implementation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tycoon_core::audit::GENESIS_DIGEST;
use tycoon_core::{
    AuditEvent, AuditFilter, Business, BusinessId, CartLine, Category, CategoryId, Item, ItemId,
    NewBusiness, NewItem, Result, Subcategory, SubcategoryId, TycoonError, User, UserId,
};

use crate::batch::{CommitReceipt, WriteBatch};

/// Transactional record store behind the ledger.
///
/// Every method is atomic on its own; [`AccountStore::commit`] is the only way to
/// change several rows (budgets, prices, carts, audit) in one unit.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Provision a new business.
    async fn create_business(&self, new: NewBusiness) -> Result<Business>;

    /// Get a business by id.
    async fn get_business(&self, id: BusinessId) -> Result<Option<Business>>;

    /// All businesses ordered by id.
    async fn list_businesses(&self) -> Result<Vec<Business>>;

    /// Get a user, creating it on first interaction.
    async fn ensure_user(&self, id: UserId) -> Result<User>;

    /// Get a user by id.
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// All users ordered by id.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Associate an existing user with an existing business.
    async fn assign_business(&self, user_id: UserId, business_id: BusinessId) -> Result<User>;

    /// Users that own `business_id`, ordered by id.
    async fn owners_of(&self, business_id: BusinessId) -> Result<Vec<User>> {
        Ok(self
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.owns(business_id))
            .collect())
    }

    /// Provision a catalog category.
    async fn create_category(&self, name: &str) -> Result<Category>;

    /// Provision a subcategory under an existing category.
    async fn create_subcategory(&self, category_id: CategoryId, name: &str) -> Result<Subcategory>;

    /// Provision an item under an existing subcategory.
    async fn create_item(&self, new: NewItem) -> Result<Item>;

    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn list_subcategories(&self, category_id: CategoryId) -> Result<Vec<Subcategory>>;

    async fn list_items(&self, subcategory_id: SubcategoryId) -> Result<Vec<Item>>;

    /// Every item in the catalog ordered by id.
    async fn list_all_items(&self) -> Result<Vec<Item>>;

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>>;

    /// Cart lines of a user in insertion order.
    async fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Add `quantity` of an item, accumulating onto an existing line.
    async fn add_to_cart(&self, user_id: UserId, item_id: ItemId, quantity: i64) -> Result<CartLine>;

    /// Remove every cart line of a user.
    async fn clear_cart(&self, user_id: UserId) -> Result<()>;

    /// Audit events matching `filter`, in sequence order.
    async fn audit_events(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>>;

    /// Apply a batch atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt>;

    /// Current store version (monotonically increasing).
    async fn version(&self) -> u64;
}

#[derive(Debug, Default)]
struct Tables {
    businesses: BTreeMap<BusinessId, Business>,
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    subcategories: BTreeMap<SubcategoryId, Subcategory>,
    items: BTreeMap<ItemId, Item>,
    carts: BTreeMap<UserId, Vec<CartLine>>,
    audit: Vec<AuditEvent>,
    next_id: i64,
    version: u64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    /// Check a batch against the current rows without applying anything.
    fn validate(&self, batch: &WriteBatch) -> Result<()> {
        for business in batch.businesses() {
            if !self.businesses.contains_key(&business.id) {
                return Err(TycoonError::not_found(BusinessId::LABEL, business.id));
            }
            if business.budget < 0 {
                return Err(TycoonError::store(format!(
                    "refusing to persist negative budget for business {}",
                    business.id
                )));
            }
        }
        for item in batch.items() {
            if !self.items.contains_key(&item.id) {
                return Err(TycoonError::not_found(ItemId::LABEL, item.id));
            }
        }
        for draft in batch.audit() {
            if !self.users.contains_key(&draft.user_id) {
                return Err(TycoonError::not_found(UserId::LABEL, draft.user_id));
            }
            if let Some(business_id) = draft.business_id {
                if !self.businesses.contains_key(&business_id) {
                    return Err(TycoonError::not_found(BusinessId::LABEL, business_id));
                }
            }
        }
        Ok(())
    }
}

/// In-memory implementation of AccountStore.
pub struct InMemoryAccountStore {
    tables: Arc<RwLock<Tables>>,

    /// Number of upcoming commits that fail with `StoreFailure`.
    failing_commits: AtomicUsize,

    /// Number of upcoming user scans that fail with `StoreFailure`.
    failing_user_scans: AtomicUsize,
}

impl InMemoryAccountStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            failing_commits: AtomicUsize::new(0),
            failing_user_scans: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` commits fail without applying anything.
    #[cfg(any(test, feature = "testing"))]
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` calls to `list_users` (and `owners_of`) fail.
    #[cfg(any(test, feature = "testing"))]
    pub fn fail_next_user_scans(&self, count: usize) {
        self.failing_user_scans.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create_business(&self, new: NewBusiness) -> Result<Business> {
        new.validate()?;
        let mut tables = self.tables.write().await;
        let id = BusinessId(tables.next_id());
        let business = new.into_business(id);
        tables.businesses.insert(id, business.clone());
        tables.bump();
        Ok(business)
    }

    async fn get_business(&self, id: BusinessId) -> Result<Option<Business>> {
        let tables = self.tables.read().await;
        Ok(tables.businesses.get(&id).cloned())
    }

    async fn list_businesses(&self) -> Result<Vec<Business>> {
        let tables = self.tables.read().await;
        Ok(tables.businesses.values().cloned().collect())
    }

    async fn ensure_user(&self, id: UserId) -> Result<User> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get(&id) {
            return Ok(user.clone());
        }
        let user = User::new(id);
        tables.users.insert(id, user.clone());
        tables.bump();
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        if Self::take_injected_failure(&self.failing_user_scans) {
            return Err(TycoonError::store("injected read failure"));
        }
        let tables = self.tables.read().await;
        Ok(tables.users.values().cloned().collect())
    }

    async fn assign_business(&self, user_id: UserId, business_id: BusinessId) -> Result<User> {
        let mut tables = self.tables.write().await;
        if !tables.businesses.contains_key(&business_id) {
            return Err(TycoonError::not_found(BusinessId::LABEL, business_id));
        }
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| TycoonError::not_found(UserId::LABEL, user_id))?;
        user.business_id = Some(business_id);
        let user = user.clone();
        tables.bump();
        Ok(user)
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let mut tables = self.tables.write().await;
        let category = Category {
            id: CategoryId(tables.next_id()),
            name: name.to_string(),
        };
        tables.categories.insert(category.id, category.clone());
        tables.bump();
        Ok(category)
    }

    async fn create_subcategory(&self, category_id: CategoryId, name: &str) -> Result<Subcategory> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains_key(&category_id) {
            return Err(TycoonError::not_found(CategoryId::LABEL, category_id));
        }
        let subcategory = Subcategory {
            id: SubcategoryId(tables.next_id()),
            category_id,
            name: name.to_string(),
        };
        tables.subcategories.insert(subcategory.id, subcategory.clone());
        tables.bump();
        Ok(subcategory)
    }

    async fn create_item(&self, new: NewItem) -> Result<Item> {
        new.validate()?;
        let mut tables = self.tables.write().await;
        if !tables.subcategories.contains_key(&new.subcategory_id) {
            return Err(TycoonError::not_found(SubcategoryId::LABEL, new.subcategory_id));
        }
        let item = new.into_item(ItemId(tables.next_id()));
        tables.items.insert(item.id, item.clone());
        tables.bump();
        Ok(item)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let tables = self.tables.read().await;
        Ok(tables.categories.values().cloned().collect())
    }

    async fn list_subcategories(&self, category_id: CategoryId) -> Result<Vec<Subcategory>> {
        let tables = self.tables.read().await;
        Ok(tables
            .subcategories
            .values()
            .filter(|s| s.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn list_items(&self, subcategory_id: SubcategoryId) -> Result<Vec<Item>> {
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .values()
            .filter(|i| i.subcategory_id == subcategory_id)
            .cloned()
            .collect())
    }

    async fn list_all_items(&self) -> Result<Vec<Item>> {
        let tables = self.tables.read().await;
        Ok(tables.items.values().cloned().collect())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let tables = self.tables.read().await;
        Ok(tables.items.get(&id).cloned())
    }

    async fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let tables = self.tables.read().await;
        Ok(tables.carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn add_to_cart(&self, user_id: UserId, item_id: ItemId, quantity: i64) -> Result<CartLine> {
        if quantity <= 0 {
            return Err(TycoonError::invalid(format!(
                "quantity must be greater than 0, got {}",
                quantity
            )));
        }

        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(TycoonError::not_found(UserId::LABEL, user_id));
        }
        if !tables.items.contains_key(&item_id) {
            return Err(TycoonError::not_found(ItemId::LABEL, item_id));
        }

        let lines = tables.carts.entry(user_id).or_default();
        let line = match lines.iter_mut().find(|l| l.item_id == item_id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| TycoonError::invalid("cart quantity overflows"))?;
                line.clone()
            }
            None => {
                let line = CartLine {
                    user_id,
                    item_id,
                    quantity,
                };
                lines.push(line.clone());
                line
            }
        };
        tables.bump();
        Ok(line)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.carts.remove(&user_id);
        tables.bump();
        Ok(())
    }

    async fn audit_events(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        let tables = self.tables.read().await;
        Ok(filter.apply(&tables.audit))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt> {
        let mut tables = self.tables.write().await;

        if Self::take_injected_failure(&self.failing_commits) {
            return Err(TycoonError::store("injected commit failure"));
        }
        tables.validate(&batch)?;

        let (businesses, items, audit, cleared_carts) = batch.into_parts();
        for business in businesses {
            tables.businesses.insert(business.id, business);
        }
        for item in items {
            tables.items.insert(item.id, item);
        }
        for user_id in cleared_carts {
            tables.carts.remove(&user_id);
        }

        let now = Utc::now();
        let mut sealed = Vec::with_capacity(audit.len());
        for draft in audit {
            let seq = tables.audit.len() as u64 + 1;
            let prev = tables
                .audit
                .last()
                .map(|e| e.digest.clone())
                .unwrap_or_else(|| GENESIS_DIGEST.to_string());
            let event = AuditEvent::seal(draft, seq, &prev, now);
            tables.audit.push(event.clone());
            sealed.push(event);
        }

        let version = tables.bump();
        Ok(CommitReceipt {
            version,
            events: sealed,
        })
    }

    async fn version(&self) -> u64 {
        self.tables.read().await.version
    }
}
