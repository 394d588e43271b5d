//! Error types for the Tycoon ledger.

use thiserror::Error;

use crate::types::{BusinessId, Money, UserId};

/// Main error type for ledger, store and workflow operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TycoonError {
    /// Account, item, user or proposal does not exist.
    #[error("{resource_type} {id} not found")]
    NotFound { resource_type: String, id: String },

    /// The operation would leave a budget below zero.
    #[error("Insufficient funds in business {business_id}: available {available}, required {required}")]
    InsufficientFunds {
        business_id: BusinessId,
        available: Money,
        required: Money,
    },

    /// Input failed validation (non-positive amount, empty text, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Checkout was requested with nothing in the cart.
    #[error("Cart of user {user_id} is empty")]
    EmptyCart { user_id: UserId },

    /// The user is not associated with any business.
    #[error("User {user_id} has no registered business")]
    NoBusiness { user_id: UserId },

    /// The underlying store failed during a write.
    #[error("Store failure: {message}")]
    StoreFailure { message: String },

    /// A workflow step was requested in a state that does not accept it.
    #[error("Cannot {action} while {state}")]
    InvalidTransition { state: String, action: String },

    /// The caller is not allowed to perform the operation.
    #[error("User {user_id} is not authorized for this operation")]
    Unauthorized { user_id: UserId },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection error (remote clients only).
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A remote node refused the request (remote clients only).
    #[error("Rejected by node ({code}): {message}")]
    Rejected { code: String, message: String },
}

impl TycoonError {
    pub fn not_found(resource_type: impl Into<String>, id: impl ToString) -> Self {
        TycoonError::NotFound {
            resource_type: resource_type.into(),
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        TycoonError::InvalidInput(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        TycoonError::StoreFailure {
            message: message.into(),
        }
    }

    pub fn transition(state: impl Into<String>, action: impl Into<String>) -> Self {
        TycoonError::InvalidTransition {
            state: state.into(),
            action: action.into(),
        }
    }

    /// Returns true if the caller may simply retry or re-prompt.
    ///
    /// None of these leave partial state behind.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TycoonError::InvalidInput(_)
                | TycoonError::InvalidTransition { .. }
                | TycoonError::StoreFailure { .. }
                | TycoonError::ConnectionError(_)
        )
    }

    /// Returns true if the message is meant to be shown to the end user as is.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            TycoonError::NotFound { .. }
                | TycoonError::InsufficientFunds { .. }
                | TycoonError::InvalidInput(_)
                | TycoonError::EmptyCart { .. }
                | TycoonError::NoBusiness { .. }
        )
    }

    /// Returns the business involved, if any.
    pub fn business_id(&self) -> Option<BusinessId> {
        match self {
            TycoonError::InsufficientFunds { business_id, .. } => Some(*business_id),
            _ => None,
        }
    }
}

/// Convenience Result type for Tycoon operations.
pub type Result<T> = std::result::Result<T, TycoonError>;

impl From<serde_json::Error> for TycoonError {
    fn from(err: serde_json::Error) -> Self {
        TycoonError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(TycoonError::invalid("amount must be positive").is_recoverable());
        assert!(TycoonError::store("disk full").is_recoverable());
        assert!(!TycoonError::not_found("Business", 7).is_recoverable());
    }

    #[test]
    fn test_user_facing_errors() {
        let err = TycoonError::InsufficientFunds {
            business_id: BusinessId(3),
            available: 50,
            required: 100,
        };
        assert!(err.is_user_facing());
        assert_eq!(err.business_id(), Some(BusinessId(3)));
        assert!(!TycoonError::store("boom").is_user_facing());
    }

    #[test]
    fn test_error_messages() {
        let err = TycoonError::not_found("Business", 42);
        assert_eq!(err.to_string(), "Business 42 not found");

        let err = TycoonError::EmptyCart { user_id: UserId(9) };
        assert_eq!(err.to_string(), "Cart of user 9 is empty");
    }
}
