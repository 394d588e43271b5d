//! Mapping of ledger errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use tycoon_core::TycoonError;

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub error: String,
    pub message: String,
}

/// JSON error response.
pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: code.to_string(),
            message: message.into(),
        }),
    )
        .into_response()
}

/// A [`TycoonError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub TycoonError);

pub type ApiResult<T> = Result<Json<T>, ApiError>;

impl From<TycoonError> for ApiError {
    fn from(err: TycoonError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            TycoonError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            TycoonError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            TycoonError::InsufficientFunds { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_funds")
            }
            TycoonError::EmptyCart { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "empty_cart"),
            TycoonError::NoBusiness { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "no_business"),
            TycoonError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            TycoonError::Unauthorized { .. } => (StatusCode::FORBIDDEN, "unauthorized"),
            TycoonError::StoreFailure { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "store_failure"),
            TycoonError::SerializationError(_) => (StatusCode::BAD_REQUEST, "serialization"),
            TycoonError::ConnectionError(_) | TycoonError::Rejected { .. } => {
                (StatusCode::BAD_GATEWAY, "upstream")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(code, "Request failed: {}", self.0);
            // Store details stay in the log.
            return json_error(status, code, "Internal error, please try again");
        }
        debug!(code, "Request rejected: {}", self.0);
        json_error(status, code, self.0.to_string())
    }
}
