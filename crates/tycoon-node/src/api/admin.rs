//! Administrative endpoints. Every handler is authorized by the console.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tycoon_core::{AuditEvent, AuditFilter, Business, BusinessId, Money};
use tycoon_ledger::{BudgetReport, ChainReport, PriceAdjustment, SettlementReport};

use super::{ApiResult, Caller};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct AmountRequest {
    pub amount: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InflationRequest {
    /// Signed percentage, at least -100.
    pub pct: i64,
}

/// The budget report with its printable rendering.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    pub report: BudgetReport,
    pub text: String,
}

pub async fn credit(
    State(state): State<AppState>,
    Caller(admin): Caller,
    Path(business_id): Path<BusinessId>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Business> {
    Ok(Json(state.admin.credit(admin, business_id, req.amount).await?))
}

pub async fn debit(
    State(state): State<AppState>,
    Caller(admin): Caller,
    Path(business_id): Path<BusinessId>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Business> {
    Ok(Json(state.admin.debit(admin, business_id, req.amount).await?))
}

pub async fn set_monthly_expense(
    State(state): State<AppState>,
    Caller(admin): Caller,
    Path(business_id): Path<BusinessId>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Business> {
    Ok(Json(
        state
            .admin
            .set_monthly_expense(admin, business_id, req.amount)
            .await?,
    ))
}

pub async fn run_settlement(State(state): State<AppState>, Caller(admin): Caller) -> ApiResult<SettlementReport> {
    Ok(Json(state.admin.run_settlement(admin).await?))
}

pub async fn apply_inflation(
    State(state): State<AppState>,
    Caller(admin): Caller,
    Json(req): Json<InflationRequest>,
) -> ApiResult<PriceAdjustment> {
    Ok(Json(state.admin.apply_inflation(admin, req.pct).await?))
}

pub async fn budget_report(State(state): State<AppState>, Caller(admin): Caller) -> ApiResult<ReportResponse> {
    let report = state.admin.budget_report(admin).await?;
    Ok(Json(ReportResponse {
        text: report.render(),
        report,
    }))
}

/// Audit events, filtered by `business_id`, `user_id`, `event_type` and `limit`.
pub async fn audit_events(
    State(state): State<AppState>,
    Caller(admin): Caller,
    Query(filter): Query<AuditFilter>,
) -> ApiResult<Vec<AuditEvent>> {
    Ok(Json(state.admin.audit_events(admin, &filter).await?))
}

pub async fn verify_audit(State(state): State<AppState>, Caller(admin): Caller) -> ApiResult<ChainReport> {
    Ok(Json(state.admin.verify_audit(admin).await?))
}
