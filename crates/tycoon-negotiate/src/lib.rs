//! # Tycoon Negotiate
//!
//! Two-party contract negotiation: an initiator proposes a payment to
//! another business, the partner approves, and the ledger transfers the
//! amount.

pub mod protocol;
pub mod session;
pub mod workflow;

pub use protocol::{ContractProposal, NegotiationCommand, NegotiationReply, PartnerOption};
pub use session::NegotiationState;
pub use workflow::ContractWorkflow;
