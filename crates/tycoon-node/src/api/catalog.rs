//! Catalog browsing.

use axum::{
    extract::{Path, State},
    Json,
};
use tycoon_core::{Category, CategoryId, Item, ItemId, Subcategory, SubcategoryId};

use super::ApiResult;
use crate::state::AppState;

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    Ok(Json(state.services.catalog.categories().await?))
}

pub async fn list_subcategories(
    State(state): State<AppState>,
    Path(category_id): Path<CategoryId>,
) -> ApiResult<Vec<Subcategory>> {
    Ok(Json(state.services.catalog.subcategories(category_id).await?))
}

pub async fn list_items(
    State(state): State<AppState>,
    Path(subcategory_id): Path<SubcategoryId>,
) -> ApiResult<Vec<Item>> {
    Ok(Json(state.services.catalog.items(subcategory_id).await?))
}

pub async fn get_item(State(state): State<AppState>, Path(id): Path<ItemId>) -> ApiResult<Item> {
    Ok(Json(state.services.catalog.item(id).await?))
}
