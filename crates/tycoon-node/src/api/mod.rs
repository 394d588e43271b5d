//! HTTP and WebSocket endpoints.

pub mod admin;
pub mod business;
pub mod cart;
pub mod catalog;
pub mod contract;
pub mod error;
pub mod health;
pub mod ws;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tycoon_core::{TycoonError, UserId};

pub use error::{ApiError, ApiResult, ErrorBody};

/// Header carrying the caller's identity, set by the messaging front end.
pub const USER_HEADER: &str = "x-user-id";

/// The authenticated participant making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| TycoonError::invalid(format!("missing {} header", USER_HEADER)))?
            .to_str()
            .map_err(|_| TycoonError::invalid(format!("{} header is not valid text", USER_HEADER)))?;
        Ok(Caller(raw.parse()?))
    }
}
