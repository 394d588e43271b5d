//! # Tycoon Node
//!
//! HTTP and WebSocket server in front of the Tycoon ledger. The messaging
//! front end calls it on behalf of participants (identified by the
//! `x-user-id` header) and subscribes to their notifications.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tycoon_ledger::BroadcastNotifier;
use tycoon_store::{AccountStore, InMemoryAccountStore, SqliteAccountStore};

pub mod api;
pub mod config;
pub mod scheduler;
pub mod seed;
pub mod state;

use config::NodeConfig;
use scheduler::SettlementScheduler;
use seed::Seed;
use state::AppState;

/// Install the global tracing subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed, e.g. by a test harness.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Open the configured store, apply the seed and wire the services.
pub async fn build_state(config: &NodeConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn AccountStore> = match &config.database {
        Some(path) => {
            info!("Opening SQLite store at {}", path.display());
            Arc::new(SqliteAccountStore::open(path)?)
        }
        None => {
            info!("Using in-memory store");
            Arc::new(InMemoryAccountStore::new())
        }
    };

    if let Some(path) = &config.seed {
        Seed::load(path)?.apply(store.as_ref()).await?;
    }

    let notifier = Arc::new(BroadcastNotifier::new(config.notifier.clone()));
    Ok(AppState::new(
        store,
        Arc::new(config.admins.clone()),
        notifier,
    ))
}

/// Run the Tycoon node server.
pub async fn run_server(config: NodeConfig) -> anyhow::Result<()> {
    info!("Tycoon node starting...");

    let state = build_state(&config).await?;
    if config.admins.is_empty() {
        info!("No administrators configured, admin endpoints will reject every caller");
    }

    if let Some(period) = config.settlement_interval {
        SettlementScheduler::new(state.services.settlement.clone(), period).spawn();
    }

    let app = create_router(state);

    info!("Listening on http://{}", config.addr);
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health::health_check))
        // Registration
        .route("/api/v1/users/register", post(api::business::register_user))
        .route("/api/v1/businesses/unclaimed", get(api::business::unclaimed_businesses))
        .route("/api/v1/registration", post(api::business::complete_registration))
        .route("/api/v1/me/business", get(api::business::my_business))
        // Catalog
        .route("/api/v1/catalog/categories", get(api::catalog::list_categories))
        .route(
            "/api/v1/catalog/categories/:id/subcategories",
            get(api::catalog::list_subcategories),
        )
        .route("/api/v1/catalog/subcategories/:id/items", get(api::catalog::list_items))
        .route("/api/v1/catalog/items/:id", get(api::catalog::get_item))
        // Cart
        .route(
            "/api/v1/cart",
            get(api::cart::view_cart).delete(api::cart::cancel_checkout),
        )
        .route("/api/v1/cart/items", post(api::cart::add_to_cart))
        .route("/api/v1/cart/checkout", post(api::cart::checkout))
        // Contracts
        .route("/api/v1/contracts", post(api::contract::submit_command))
        .route("/api/v1/contracts/state", get(api::contract::current_state))
        .route("/api/v1/contracts/pending", get(api::contract::pending_proposals))
        // Administration
        .route("/api/v1/admin/businesses/:id/credit", post(api::admin::credit))
        .route("/api/v1/admin/businesses/:id/debit", post(api::admin::debit))
        .route("/api/v1/admin/businesses/:id/expense", put(api::admin::set_monthly_expense))
        .route("/api/v1/admin/settlement", post(api::admin::run_settlement))
        .route("/api/v1/admin/inflation", post(api::admin::apply_inflation))
        .route("/api/v1/admin/report", get(api::admin::budget_report))
        .route("/api/v1/admin/audit", get(api::admin::audit_events))
        .route("/api/v1/admin/audit/verify", get(api::admin::verify_audit))
        // Notifications
        .route("/ws/notifications/:user_id", get(api::ws::notification_stream))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
