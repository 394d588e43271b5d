//! # Tycoon Store
//!
//! Transactional storage for businesses, users, the catalog, carts and the
//! audit log.
//!
//! Every mutation that touches more than one row goes through a
//! [`WriteBatch`] and is applied with [`AccountStore::commit`], which either
//! applies the whole batch or nothing.

pub mod batch;
#[cfg(feature = "sqlite")]
mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;

pub use batch::{CommitReceipt, WriteBatch};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAccountStore;
pub use store::{AccountStore, InMemoryAccountStore};
