//! # Tycoon Ledger
//!
//! The transaction engine of the Tycoon economy.
//!
//! - [`Ledger`] - credit, debit and transfer under per-account locks
//! - [`SettlementProcessor`] - monthly collection of recurring expenses
//! - [`Checkout`] - carts and atomic checkout
//! - [`CatalogPricing`] - bulk percentage price adjustment
//! - [`AdminConsole`] - privileged variants gated by an [`Authorizer`]

pub mod admin;
pub mod audit;
pub mod catalog;
pub mod checkout;
pub mod ledger;
pub mod locks;
pub mod notify;
pub mod pricing;
pub mod registration;
pub mod report;
pub mod settlement;

use std::sync::Arc;

use tycoon_store::AccountStore;

pub use admin::{AdminConsole, AdminSet, Authorizer};
pub use audit::{AuditLog, ChainReport};
pub use catalog::Catalog;
pub use checkout::{Checkout, CheckoutReceipt};
pub use ledger::{Ledger, TransferReceipt};
pub use locks::LockTable;
pub use notify::{BroadcastNotifier, Notifier, NotifierConfig, NullNotifier};
pub use pricing::{CatalogPricing, PriceAdjustment};
pub use registration::Registration;
pub use report::{BudgetReport, CompanyLine, TypeSummary};
pub use settlement::{AccountSettlement, SettlementOutcome, SettlementProcessor, SettlementReport};

/// Every ledger service wired over one store and one notifier.
///
/// All services share the same [`Ledger`], and therefore the same account
/// locks.
#[derive(Clone)]
pub struct Services {
    pub ledger: Arc<Ledger>,
    pub audit: Arc<AuditLog>,
    pub settlement: Arc<SettlementProcessor>,
    pub checkout: Arc<Checkout>,
    pub pricing: Arc<CatalogPricing>,
    pub catalog: Arc<Catalog>,
    pub registration: Arc<Registration>,
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    pub fn new(store: Arc<dyn AccountStore>, notifier: Arc<dyn Notifier>) -> Self {
        let ledger = Arc::new(Ledger::new(store.clone()));
        Self {
            audit: Arc::new(AuditLog::new(store.clone())),
            settlement: Arc::new(SettlementProcessor::new(ledger.clone(), notifier.clone())),
            checkout: Arc::new(Checkout::new(ledger.clone(), notifier.clone())),
            pricing: Arc::new(CatalogPricing::new(store.clone())),
            catalog: Arc::new(Catalog::new(store)),
            registration: Arc::new(Registration::new(ledger.clone(), notifier.clone())),
            ledger,
            notifier,
        }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        self.ledger.store()
    }

    /// The admin console over these services.
    pub fn admin_console(&self, authorizer: Arc<dyn Authorizer>) -> AdminConsole {
        AdminConsole::new(
            authorizer,
            self.ledger.clone(),
            self.settlement.clone(),
            self.pricing.clone(),
            self.audit.clone(),
            self.notifier.clone(),
        )
    }
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        AdminConsole, AdminSet, Authorizer, BroadcastNotifier, Checkout, Ledger, Notifier,
        Services, SettlementProcessor,
    };
}
