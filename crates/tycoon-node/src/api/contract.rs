//! Contract negotiation endpoints.

use axum::{extract::State, Json};
use tycoon_negotiate::{ContractProposal, NegotiationCommand, NegotiationReply, NegotiationState};

use super::{ApiResult, Caller};
use crate::state::AppState;

/// Apply one negotiation command on behalf of the caller.
pub async fn submit_command(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(command): Json<NegotiationCommand>,
) -> ApiResult<NegotiationReply> {
    Ok(Json(state.workflow.handle(user_id, command).await?))
}

/// The caller's own negotiation.
pub async fn current_state(State(state): State<AppState>, Caller(user_id): Caller) -> Json<NegotiationState> {
    Json(state.workflow.state(user_id).await)
}

/// Proposals waiting for the caller's business to answer.
pub async fn pending_proposals(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> ApiResult<Vec<ContractProposal>> {
    let business = state.services.registration.my_business(user_id).await?;
    Ok(Json(state.workflow.pending_for(business.id).await))
}
