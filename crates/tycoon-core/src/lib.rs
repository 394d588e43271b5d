//! # Tycoon Core
//!
//! Core data model for the Tycoon business ledger.
//!
//! This crate provides the fundamental building blocks:
//! - [`Business`] and [`User`] - accounts and their owners
//! - [`Item`], [`CartLine`], [`CartSummary`] - catalog and carts
//! - [`AuditEvent`] - append-only, hash-chained audit records
//! - [`Notification`] - plain-text messages for the delivery layer
//! - [`TycoonError`] - the error taxonomy shared by every crate

pub mod audit;
pub mod business;
pub mod catalog;
pub mod error;
pub mod notification;
pub mod types;

// Re-exports for convenience
pub use audit::{AuditDraft, AuditEvent, AuditEventType, AuditFilter};
pub use business::{Business, BusinessBuilder, NewBusiness, User};
pub use catalog::{CartLine, CartSummary, Category, Item, NewItem, PricedLine, Subcategory};
pub use error::{Result, TycoonError};
pub use notification::{Notification, Recipient};
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::audit::{AuditDraft, AuditEvent, AuditEventType, AuditFilter};
    pub use crate::business::{Business, NewBusiness, User};
    pub use crate::catalog::{CartLine, CartSummary, Item};
    pub use crate::error::{Result, TycoonError};
    pub use crate::notification::{Notification, Recipient};
    pub use crate::types::{BusinessId, ItemId, Money, UserId};
}
