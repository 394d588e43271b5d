//! Shared application state.

use std::sync::Arc;

use tycoon_ledger::{AdminConsole, Authorizer, BroadcastNotifier, Services};
use tycoon_negotiate::ContractWorkflow;
use tycoon_store::AccountStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Ledger services over the configured store.
    pub services: Services,

    /// Contract negotiations, one per initiator.
    pub workflow: Arc<ContractWorkflow>,

    /// Privileged operations.
    pub admin: Arc<AdminConsole>,

    /// Notification fan-out feeding the WebSocket streams.
    pub notifier: Arc<BroadcastNotifier>,
}

impl AppState {
    /// Wire every service over `store`.
    pub fn new(
        store: Arc<dyn AccountStore>,
        authorizer: Arc<dyn Authorizer>,
        notifier: Arc<BroadcastNotifier>,
    ) -> Self {
        let services = Services::new(store, notifier.clone());
        let workflow = Arc::new(ContractWorkflow::new(
            services.ledger.clone(),
            notifier.clone(),
        ));
        let admin = Arc::new(services.admin_console(authorizer));
        Self {
            services,
            workflow,
            admin,
            notifier,
        }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        self.services.store()
    }
}
