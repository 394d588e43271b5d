//! Health check endpoint.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol: String,

    /// Number of committed store writes.
    pub store_version: u64,

    /// Connected notification streams.
    pub subscribers: usize,
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        protocol: "tycoon/1.0".to_string(),
        store_version: state.store().version().await,
        subscribers: state.notifier.subscriber_count(),
    })
}
