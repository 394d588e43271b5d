//! Registration and account endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tycoon_core::{Business, BusinessId, User};

use super::{ApiResult, Caller};
use crate::state::AppState;

/// Request to finish registration.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteRegistrationRequest {
    pub business_id: BusinessId,
    /// Display name for the business.
    pub name: String,
}

/// The caller's business with its printable overview.
#[derive(Debug, Serialize, Deserialize)]
pub struct BusinessResponse {
    pub business: Business,
    pub overview: String,
}

impl From<Business> for BusinessResponse {
    fn from(business: Business) -> Self {
        Self {
            overview: business.overview(),
            business,
        }
    }
}

/// Create the caller on first interaction.
pub async fn register_user(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> ApiResult<User> {
    Ok(Json(state.services.registration.register_user(user_id).await?))
}

/// Businesses nobody owns yet.
pub async fn unclaimed_businesses(State(state): State<AppState>) -> ApiResult<Vec<Business>> {
    Ok(Json(state.services.registration.unclaimed_businesses().await?))
}

/// Claim and name a business.
pub async fn complete_registration(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<CompleteRegistrationRequest>,
) -> Result<(StatusCode, Json<BusinessResponse>), super::ApiError> {
    let business = state
        .services
        .registration
        .complete_registration(user_id, req.business_id, &req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(business.into())))
}

/// The caller's own business.
pub async fn my_business(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> ApiResult<BusinessResponse> {
    let business = state.services.registration.my_business(user_id).await?;
    Ok(Json(business.into()))
}
