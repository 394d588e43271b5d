//! # Tycoon SDK
//!
//! Client SDK for interacting with Tycoon nodes.

pub mod client;
pub mod stream;

pub use client::{HealthStatus, TycoonClient};
pub use stream::{NotificationEvent, NotificationStream};

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::client::TycoonClient;
    pub use crate::stream::{NotificationEvent, NotificationStream};
    pub use tycoon_core::prelude::*;
    pub use tycoon_negotiate::{NegotiationCommand, NegotiationReply, NegotiationState};
}
