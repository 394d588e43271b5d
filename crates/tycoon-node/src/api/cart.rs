//! Cart and checkout endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tycoon_core::{CartLine, CartSummary, ItemId};
use tycoon_ledger::CheckoutReceipt;

use super::{ApiError, ApiResult, Caller};
use crate::state::AppState;

/// Request to add an item to the cart.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddToCartRequest {
    pub item_id: ItemId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// The priced cart with its printable receipt.
#[derive(Debug, Serialize, Deserialize)]
pub struct CartResponse {
    pub cart: CartSummary,
    pub text: String,
}

pub async fn view_cart(State(state): State<AppState>, Caller(user_id): Caller) -> ApiResult<CartResponse> {
    let cart = state.services.checkout.view_cart(user_id).await?;
    Ok(Json(CartResponse {
        text: cart.render(),
        cart,
    }))
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartLine>), ApiError> {
    let line = state
        .services
        .checkout
        .add_to_cart(user_id, req.item_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// Pay for the cart at current prices.
pub async fn checkout(State(state): State<AppState>, Caller(user_id): Caller) -> ApiResult<CheckoutReceipt> {
    Ok(Json(state.services.checkout.checkout(user_id).await?))
}

/// Empty the cart without paying.
pub async fn cancel_checkout(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> Result<StatusCode, ApiError> {
    state.services.checkout.cancel_checkout(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
