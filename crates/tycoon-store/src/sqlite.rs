//! SQLite-backed AccountStore with enforced foreign keys.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use tycoon_core::audit::GENESIS_DIGEST;
use tycoon_core::{
    AuditEvent, AuditEventType, AuditFilter, Business, BusinessId, CartLine, Category, CategoryId,
    Item, ItemId, NewBusiness, NewItem, Result, Subcategory, SubcategoryId, TycoonError, User,
    UserId,
};
use uuid::Uuid;

use crate::batch::{CommitReceipt, WriteBatch};
use crate::schema;
use crate::store::AccountStore;

trait IntoStoreResult<T> {
    fn into_store(self) -> Result<T>;
}

impl<T> IntoStoreResult<T> for rusqlite::Result<T> {
    fn into_store(self) -> Result<T> {
        self.map_err(|e| TycoonError::store(e.to_string()))
    }
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

const BUSINESS_COLUMNS: &str = "id, business_type, name, budget, monthly_expense, income, cost";
const ITEM_COLUMNS: &str = "id, name, price, weight, subcategory_id";
const AUDIT_COLUMNS: &str =
    "seq, id, user_id, business_id, event_type, description, timestamp, prev_digest, digest";

fn business_from_row(row: &Row<'_>) -> rusqlite::Result<Business> {
    Ok(Business {
        id: BusinessId(row.get(0)?),
        business_type: row.get(1)?,
        name: row.get(2)?,
        budget: row.get(3)?,
        monthly_expense: row.get(4)?,
        income: row.get(5)?,
        cost: row.get(6)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        business_id: row.get::<_, Option<i64>>(1)?.map(BusinessId),
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: ItemId(row.get(0)?),
        name: row.get(1)?,
        price: row.get(2)?,
        weight: row.get(3)?,
        subcategory_id: SubcategoryId(row.get(4)?),
    })
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEvent> {
    let id: String = row.get(1)?;
    let event_type: String = row.get(4)?;
    let timestamp: String = row.get(6)?;

    Ok(AuditEvent {
        seq: row.get::<_, i64>(0)? as u64,
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(1, e))?,
        user_id: UserId(row.get(2)?),
        business_id: row.get::<_, Option<i64>>(3)?.map(BusinessId),
        event_type: AuditEventType::parse(&event_type).ok_or_else(|| {
            conversion_error(
                4,
                TycoonError::SerializationError(format!("unknown audit event type '{}'", event_type)),
            )
        })?,
        description: row.get(5)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| conversion_error(6, e))?,
        prev_digest: row.get(7)?,
        digest: row.get(8)?,
    })
}

fn exists(tx: &Connection, table: &str, id: i64) -> Result<bool> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table);
    tx.query_row(&sql, params![id], |row| row.get(0)).into_store()
}

/// SQLite implementation of AccountStore.
///
/// Statements run on tokio's blocking pool, one at a time.
pub struct SqliteAccountStore {
    conn: Arc<Mutex<Connection>>,
    version: AtomicU64,
}

impl SqliteAccountStore {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            TycoonError::store(format!("failed to open database {}: {}", path.display(), e))
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .into_store()?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().into_store()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").into_store()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            version: AtomicU64::new(0),
        };
        Self::migrate(&mut *Self::lock(&store.conn)?)?;
        Ok(store)
    }

    fn migrate(conn: &mut Connection) -> Result<()> {
        let has_version_table: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .into_store()?;

        if !has_version_table {
            conn.execute_batch(schema::SCHEMA_V1).into_store()?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )
            .into_store()?;
            tracing::info!(version = schema::CURRENT_VERSION, "Initialized ledger schema");
        }
        Ok(())
    }

    fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        conn.lock()
            .map_err(|_| TycoonError::store("connection mutex poisoned"))
    }

    /// Run `f` against the connection off the async worker threads.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = Self::lock(&conn)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| TycoonError::store(format!("database task failed: {}", e)))?
    }

    fn bump(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn apply_batch(tx: &Transaction<'_>, batch: WriteBatch) -> Result<Vec<AuditEvent>> {
        let (businesses, items, audit, cleared_carts) = batch.into_parts();

        for business in businesses {
            if business.budget < 0 {
                return Err(TycoonError::store(format!(
                    "refusing to persist negative budget for business {}",
                    business.id
                )));
            }
            let updated = tx
                .execute(
                    "UPDATE businesses SET business_type = ?1, name = ?2, budget = ?3, \
                     monthly_expense = ?4, income = ?5, cost = ?6 WHERE id = ?7",
                    params![
                        business.business_type,
                        business.name,
                        business.budget,
                        business.monthly_expense,
                        business.income,
                        business.cost,
                        business.id.get()
                    ],
                )
                .into_store()?;
            if updated == 0 {
                return Err(TycoonError::not_found(BusinessId::LABEL, business.id));
            }
        }

        for item in items {
            let updated = tx
                .execute(
                    "UPDATE items SET name = ?1, price = ?2, weight = ?3, subcategory_id = ?4 WHERE id = ?5",
                    params![
                        item.name,
                        item.price,
                        item.weight,
                        item.subcategory_id.get(),
                        item.id.get()
                    ],
                )
                .into_store()?;
            if updated == 0 {
                return Err(TycoonError::not_found(ItemId::LABEL, item.id));
            }
        }

        for user_id in cleared_carts {
            tx.execute("DELETE FROM cart_lines WHERE user_id = ?1", params![user_id.get()])
                .into_store()?;
        }

        let last: Option<(i64, String)> = tx
            .query_row(
                "SELECT seq, digest FROM audit_events ORDER BY seq DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .into_store()?;
        let (mut seq, mut prev) = match last {
            Some((seq, digest)) => (seq as u64, digest),
            None => (0, GENESIS_DIGEST.to_string()),
        };

        let now = Utc::now();
        let mut sealed = Vec::with_capacity(audit.len());
        for draft in audit {
            if !exists(tx, "users", draft.user_id.get())? {
                return Err(TycoonError::not_found(UserId::LABEL, draft.user_id));
            }
            if let Some(business_id) = draft.business_id {
                if !exists(tx, "businesses", business_id.get())? {
                    return Err(TycoonError::not_found(BusinessId::LABEL, business_id));
                }
            }

            seq += 1;
            let event = AuditEvent::seal(draft, seq, &prev, now);
            tx.execute(
                &format!("INSERT INTO audit_events ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)", AUDIT_COLUMNS),
                params![
                    event.seq as i64,
                    event.id.to_string(),
                    event.user_id.get(),
                    event.business_id.map(BusinessId::get),
                    event.event_type.as_str(),
                    event.description,
                    event.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                    event.prev_digest,
                    event.digest
                ],
            )
            .into_store()?;
            prev = event.digest.clone();
            sealed.push(event);
        }

        Ok(sealed)
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn create_business(&self, new: NewBusiness) -> Result<Business> {
        new.validate()?;
        let business = self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO businesses (business_type, name, budget, monthly_expense) VALUES (?1, ?2, ?3, ?4)",
                params![new.business_type, new.name, new.budget, new.monthly_expense],
            )
            .into_store()?;
            let id = BusinessId(conn.last_insert_rowid());
            Ok(new.into_business(id))
        }).await?;
        self.bump();
        Ok(business)
    }

    async fn get_business(&self, id: BusinessId) -> Result<Option<Business>> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM businesses WHERE id = ?1", BUSINESS_COLUMNS),
                params![id.get()],
                business_from_row,
            )
            .optional()
            .into_store()
        }).await
    }

    async fn list_businesses(&self) -> Result<Vec<Business>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {} FROM businesses ORDER BY id", BUSINESS_COLUMNS))
                .into_store()?;
            let rows = stmt.query_map([], business_from_row).into_store()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().into_store()
        }).await
    }

    async fn ensure_user(&self, id: UserId) -> Result<User> {
        let (user, inserted) = self.with_conn(move |conn| {
            let inserted = conn
                .execute("INSERT OR IGNORE INTO users (id) VALUES (?1)", params![id.get()])
                .into_store()?;
            let user = conn
                .query_row(
                    "SELECT id, business_id FROM users WHERE id = ?1",
                    params![id.get()],
                    user_from_row,
                )
                .into_store()?;
            Ok((user, inserted > 0))
        }).await?;
        if inserted {
            self.bump();
        }
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, business_id FROM users WHERE id = ?1",
                params![id.get()],
                user_from_row,
            )
            .optional()
            .into_store()
        }).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT id, business_id FROM users ORDER BY id")
                .into_store()?;
            let rows = stmt.query_map([], user_from_row).into_store()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().into_store()
        }).await
    }

    async fn owners_of(&self, business_id: BusinessId) -> Result<Vec<User>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT id, business_id FROM users WHERE business_id = ?1 ORDER BY id")
                .into_store()?;
            let rows = stmt
                .query_map(params![business_id.get()], user_from_row)
                .into_store()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().into_store()
        }).await
    }

    async fn assign_business(&self, user_id: UserId, business_id: BusinessId) -> Result<User> {
        let user = self.with_conn(move |conn| {
            if !exists(conn, "businesses", business_id.get())? {
                return Err(TycoonError::not_found(BusinessId::LABEL, business_id));
            }
            let updated = conn
                .execute(
                    "UPDATE users SET business_id = ?1 WHERE id = ?2",
                    params![business_id.get(), user_id.get()],
                )
                .into_store()?;
            if updated == 0 {
                return Err(TycoonError::not_found(UserId::LABEL, user_id));
            }
            Ok(User {
                id: user_id,
                business_id: Some(business_id),
            })
        }).await?;
        self.bump();
        Ok(user)
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let name = name.to_string();
        let category = self.with_conn(move |conn| {
            conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name])
                .into_store()?;
            Ok(Category {
                id: CategoryId(conn.last_insert_rowid()),
                name,
            })
        }).await?;
        self.bump();
        Ok(category)
    }

    async fn create_subcategory(&self, category_id: CategoryId, name: &str) -> Result<Subcategory> {
        let name = name.to_string();
        let subcategory = self.with_conn(move |conn| {
            if !exists(conn, "categories", category_id.get())? {
                return Err(TycoonError::not_found(CategoryId::LABEL, category_id));
            }
            conn.execute(
                "INSERT INTO subcategories (category_id, name) VALUES (?1, ?2)",
                params![category_id.get(), name],
            )
            .into_store()?;
            Ok(Subcategory {
                id: SubcategoryId(conn.last_insert_rowid()),
                category_id,
                name,
            })
        }).await?;
        self.bump();
        Ok(subcategory)
    }

    async fn create_item(&self, new: NewItem) -> Result<Item> {
        new.validate()?;
        let item = self.with_conn(move |conn| {
            if !exists(conn, "subcategories", new.subcategory_id.get())? {
                return Err(TycoonError::not_found(SubcategoryId::LABEL, new.subcategory_id));
            }
            conn.execute(
                "INSERT INTO items (name, price, weight, subcategory_id) VALUES (?1, ?2, ?3, ?4)",
                params![new.name, new.price, new.weight, new.subcategory_id.get()],
            )
            .into_store()?;
            let id = ItemId(conn.last_insert_rowid());
            Ok(new.into_item(id))
        }).await?;
        self.bump();
        Ok(item)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT id, name FROM categories ORDER BY id")
                .into_store()?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Category {
                        id: CategoryId(row.get(0)?),
                        name: row.get(1)?,
                    })
                })
                .into_store()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().into_store()
        }).await
    }

    async fn list_subcategories(&self, category_id: CategoryId) -> Result<Vec<Subcategory>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT id, category_id, name FROM subcategories WHERE category_id = ?1 ORDER BY id")
                .into_store()?;
            let rows = stmt
                .query_map(params![category_id.get()], |row| {
                    Ok(Subcategory {
                        id: SubcategoryId(row.get(0)?),
                        category_id: CategoryId(row.get(1)?),
                        name: row.get(2)?,
                    })
                })
                .into_store()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().into_store()
        }).await
    }

    async fn list_items(&self, subcategory_id: SubcategoryId) -> Result<Vec<Item>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM items WHERE subcategory_id = ?1 ORDER BY id",
                    ITEM_COLUMNS
                ))
                .into_store()?;
            let rows = stmt
                .query_map(params![subcategory_id.get()], item_from_row)
                .into_store()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().into_store()
        }).await
    }

    async fn list_all_items(&self) -> Result<Vec<Item>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {} FROM items ORDER BY id", ITEM_COLUMNS))
                .into_store()?;
            let rows = stmt.query_map([], item_from_row).into_store()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().into_store()
        }).await
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                params![id.get()],
                item_from_row,
            )
            .optional()
            .into_store()
        }).await
    }

    async fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT user_id, item_id, quantity FROM cart_lines WHERE user_id = ?1 ORDER BY id")
                .into_store()?;
            let rows = stmt
                .query_map(params![user_id.get()], |row| {
                    Ok(CartLine {
                        user_id: UserId(row.get(0)?),
                        item_id: ItemId(row.get(1)?),
                        quantity: row.get(2)?,
                    })
                })
                .into_store()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().into_store()
        }).await
    }

    async fn add_to_cart(&self, user_id: UserId, item_id: ItemId, quantity: i64) -> Result<CartLine> {
        if quantity <= 0 {
            return Err(TycoonError::invalid(format!(
                "quantity must be greater than 0, got {}",
                quantity
            )));
        }

        let line = self.with_conn(move |conn| {
            if !exists(conn, "users", user_id.get())? {
                return Err(TycoonError::not_found(UserId::LABEL, user_id));
            }
            if !exists(conn, "items", item_id.get())? {
                return Err(TycoonError::not_found(ItemId::LABEL, item_id));
            }
            conn.execute(
                "INSERT INTO cart_lines (user_id, item_id, quantity) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(user_id, item_id) DO UPDATE SET quantity = quantity + excluded.quantity",
                params![user_id.get(), item_id.get(), quantity],
            )
            .into_store()?;
            let quantity: i64 = conn
                .query_row(
                    "SELECT quantity FROM cart_lines WHERE user_id = ?1 AND item_id = ?2",
                    params![user_id.get(), item_id.get()],
                    |row| row.get(0),
                )
                .into_store()?;
            Ok(CartLine {
                user_id,
                item_id,
                quantity,
            })
        }).await?;
        self.bump();
        Ok(line)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM cart_lines WHERE user_id = ?1", params![user_id.get()])
                .into_store()?;
            Ok(())
        }).await?;
        self.bump();
        Ok(())
    }

    async fn audit_events(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        let query = filter.clone();
        let events = self.with_conn(move |conn| {
            let mut clauses = Vec::new();
            let mut args: Vec<Value> = Vec::new();
            if let Some(business_id) = query.business_id {
                args.push(Value::Integer(business_id.get()));
                clauses.push(format!("business_id = ?{}", args.len()));
            }
            if let Some(user_id) = query.user_id {
                args.push(Value::Integer(user_id.get()));
                clauses.push(format!("user_id = ?{}", args.len()));
            }
            if let Some(event_type) = query.event_type {
                args.push(Value::Text(event_type.as_str().to_string()));
                clauses.push(format!("event_type = ?{}", args.len()));
            }

            let mut sql = format!("SELECT {} FROM audit_events", AUDIT_COLUMNS);
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY seq");

            let mut stmt = conn.prepare(&sql).into_store()?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), audit_from_row)
                .into_store()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().into_store()
        }).await?;
        Ok(filter.apply(&events))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt> {
        let events = self.with_conn(move |conn| {
            let tx = conn.transaction().into_store()?;
            let events = Self::apply_batch(&tx, batch)?;
            tx.commit().into_store()?;
            Ok(events)
        }).await?;
        let version = self.bump();
        Ok(CommitReceipt { version, events })
    }

    async fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tycoon_core::audit::verify_chain;
    use tycoon_core::AuditDraft;

    async fn seeded() -> (SqliteAccountStore, Business, Item) {
        let store = SqliteAccountStore::open_in_memory().unwrap();
        let business = store
            .create_business(
                Business::builder()
                    .business_type("bakery")
                    .budget(500)
                    .monthly_expense(50)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let category = store.create_category("Food").await.unwrap();
        let sub = store.create_subcategory(category.id, "Flour").await.unwrap();
        let item = store
            .create_item(NewItem {
                name: "Rye flour".into(),
                price: 12,
                weight: 25,
                subcategory_id: sub.id,
            })
            .await
            .unwrap();
        store.ensure_user(UserId(10)).await.unwrap();
        (store, business, item)
    }

    #[tokio::test]
    async fn test_busy_connection_does_not_stall_the_runtime() {
        let (store, _, _) = seeded().await;
        let store = Arc::new(store);

        let guard = store.conn.lock().unwrap();
        let reader = tokio::spawn({
            let store = store.clone();
            async move { store.list_users().await }
        });
        // Single-threaded runtime: this only wakes if the query waits off-thread.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!reader.is_finished());
        drop(guard);

        let users = reader.await.unwrap().unwrap();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_round_trip_business() {
        let (store, business, _) = seeded().await;
        let fetched = store.get_business(business.id).await.unwrap().unwrap();
        assert_eq!(fetched, business);
        assert_eq!(store.list_businesses().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_are_checked() {
        let (store, business, _) = seeded().await;
        assert!(matches!(
            store.assign_business(UserId(10), BusinessId(404)).await,
            Err(TycoonError::NotFound { .. })
        ));
        assert!(matches!(
            store.add_to_cart(UserId(10), ItemId(404), 1).await,
            Err(TycoonError::NotFound { .. })
        ));
        assert!(matches!(
            store.create_subcategory(CategoryId(404), "x").await,
            Err(TycoonError::NotFound { .. })
        ));

        store.assign_business(UserId(10), business.id).await.unwrap();
        let owners = store.owners_of(business.id).await.unwrap();
        assert_eq!(owners, vec![User { id: UserId(10), business_id: Some(business.id) }]);
    }

    #[tokio::test]
    async fn test_cart_upsert_accumulates() {
        let (store, _, item) = seeded().await;
        store.add_to_cart(UserId(10), item.id, 2).await.unwrap();
        let line = store.add_to_cart(UserId(10), item.id, 4).await.unwrap();
        assert_eq!(line.quantity, 6);
        assert_eq!(store.cart(UserId(10)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_rolls_back_on_missing_row() {
        let (store, business, item) = seeded().await;
        store.add_to_cart(UserId(10), item.id, 1).await.unwrap();

        let batch = WriteBatch::new()
            .put_business(business.debited(100).unwrap())
            .clear_cart(UserId(10))
            .put_business(Business {
                id: BusinessId(404),
                ..business.clone()
            });
        assert!(store.commit(batch).await.is_err());

        let fetched = store.get_business(business.id).await.unwrap().unwrap();
        assert_eq!(fetched.budget, 500);
        assert_eq!(store.cart(UserId(10)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_audit_chain_survives_storage() {
        let (store, business, _) = seeded().await;
        for i in 0..3 {
            store
                .commit(WriteBatch::new().record(AuditDraft::new(
                    UserId(10),
                    Some(business.id),
                    AuditEventType::Debit,
                    format!("debit #{}", i),
                )))
                .await
                .unwrap();
        }

        let events = store.audit_events(&AuditFilter::default()).await.unwrap();
        assert_eq!(events.len(), 3);
        assert!(verify_chain(&events));

        let filtered = store
            .audit_events(&AuditFilter::event_type(AuditEventType::Credit))
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }
}
