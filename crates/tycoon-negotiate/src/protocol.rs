//! Contract negotiation messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tycoon_core::{Business, BusinessId, Money, UserId};
use uuid::Uuid;

use crate::session::NegotiationState;

/// A contract offered by one business to another. Lives only as long as the
/// negotiation that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractProposal {
    /// Unique ID for this proposal.
    pub id: Uuid,

    /// User who started the negotiation.
    pub initiator: UserId,

    /// Business that pays.
    pub initiator_business: BusinessId,

    /// Business that receives the amount.
    pub partner_business: BusinessId,

    /// Partner display name at the time the amount was entered.
    pub partner_name: String,

    pub description: String,

    /// Always greater than zero.
    pub amount: Money,

    pub created_at: DateTime<Utc>,
}

impl ContractProposal {
    /// Confirmation text shown to the initiator.
    pub fn summary(&self) -> String {
        format!(
            "Contract with {}\nDescription: {}\nAmount: {}",
            self.partner_name, self.description, self.amount
        )
    }

    /// Approval request shown to the partner.
    pub fn offer_text(&self, initiator_name: &str) -> String {
        format!(
            "{} offers a contract\nDescription: {}\nAmount: {}\nProposal: {}",
            initiator_name, self.description, self.amount, self.id
        )
    }
}

/// A business the initiator may contract with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerOption {
    pub business_id: BusinessId,
    pub name: String,
    pub business_type: String,
}

impl From<&Business> for PartnerOption {
    fn from(business: &Business) -> Self {
        Self {
            business_id: business.id,
            name: business.name.clone(),
            business_type: business.business_type.clone(),
        }
    }
}

/// Input from the dialog layer, one per user interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NegotiationCommand {
    /// Begin (or restart) a negotiation.
    Start,

    SelectPartner { business_id: BusinessId },

    EnterDescription { description: String },

    /// Raw amount text; parsed and validated by the workflow.
    EnterAmount { amount: String },

    /// Initiator confirms the summary.
    Confirm,

    /// Partner approves or declines a forwarded proposal.
    Respond { proposal_id: Uuid, approve: bool },

    Cancel,
}

/// What the dialog layer shows after a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationReply {
    /// State of the initiator's negotiation after the command.
    pub state: NegotiationState,

    /// Text to show the caller.
    pub prompt: String,

    /// Counterparties to choose from, after `start`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partners: Vec<PartnerOption>,
}

impl NegotiationReply {
    pub fn new(state: NegotiationState, prompt: impl Into<String>) -> Self {
        Self {
            state,
            prompt: prompt.into(),
            partners: Vec::new(),
        }
    }

    pub fn with_partners(mut self, partners: Vec<PartnerOption>) -> Self {
        self.partners = partners;
        self
    }
}
