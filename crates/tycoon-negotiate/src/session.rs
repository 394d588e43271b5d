//! Negotiation states and their pure transition functions.
//!
//! Every transition borrows the current state and returns the next one, so a
//! rejected input leaves the caller holding the unchanged state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tycoon_core::{Business, BusinessId, Money, Result, TycoonError, UserId};
use uuid::Uuid;

use crate::protocol::ContractProposal;

/// State of one initiator's negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NegotiationState {
    /// No negotiation in progress.
    #[default]
    Idle,

    /// Waiting for the initiator to pick a counterparty.
    SelectingPartner { initiator_business: BusinessId },

    EnteringDescription {
        initiator_business: BusinessId,
        partner_business: BusinessId,
    },

    EnteringAmount {
        initiator_business: BusinessId,
        partner_business: BusinessId,
        description: String,
    },

    /// Summary shown, waiting for the initiator to confirm.
    AwaitingInitiatorConfirm { proposal: ContractProposal },

    /// Forwarded to the partner, waiting for approval.
    AwaitingPartnerConfirm { proposal: ContractProposal },

    /// Funds moved.
    Settled {
        proposal: ContractProposal,
        initiator_budget: Money,
        partner_budget: Money,
    },

    /// Declined by the partner, or the settlement could not be covered.
    Rejected {
        proposal: ContractProposal,
        reason: String,
    },

    /// Withdrawn by the initiator.
    Cancelled,
}

impl NegotiationState {
    /// Short name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            NegotiationState::Idle => "idle",
            NegotiationState::SelectingPartner { .. } => "selecting_partner",
            NegotiationState::EnteringDescription { .. } => "entering_description",
            NegotiationState::EnteringAmount { .. } => "entering_amount",
            NegotiationState::AwaitingInitiatorConfirm { .. } => "awaiting_initiator_confirm",
            NegotiationState::AwaitingPartnerConfirm { .. } => "awaiting_partner_confirm",
            NegotiationState::Settled { .. } => "settled",
            NegotiationState::Rejected { .. } => "rejected",
            NegotiationState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NegotiationState::Settled { .. }
                | NegotiationState::Rejected { .. }
                | NegotiationState::Cancelled
        )
    }

    /// Whether the registry needs to keep this state.
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != NegotiationState::Idle
    }

    pub fn proposal(&self) -> Option<&ContractProposal> {
        match self {
            NegotiationState::AwaitingInitiatorConfirm { proposal }
            | NegotiationState::AwaitingPartnerConfirm { proposal }
            | NegotiationState::Settled { proposal, .. }
            | NegotiationState::Rejected { proposal, .. } => Some(proposal),
            _ => None,
        }
    }

    fn unexpected(&self, action: &str) -> TycoonError {
        TycoonError::transition(self.name(), action)
    }

    /// Begin a negotiation for `initiator_business`. Allowed from any state.
    pub fn start(initiator_business: BusinessId) -> NegotiationState {
        NegotiationState::SelectingPartner { initiator_business }
    }

    /// Pick the counterparty.
    pub fn select_partner(&self, partner_business: BusinessId) -> Result<NegotiationState> {
        match self {
            NegotiationState::SelectingPartner { initiator_business } => {
                if *initiator_business == partner_business {
                    return Err(TycoonError::invalid(
                        "a contract needs a business other than your own",
                    ));
                }
                Ok(NegotiationState::EnteringDescription {
                    initiator_business: *initiator_business,
                    partner_business,
                })
            }
            other => Err(other.unexpected("select a partner")),
        }
    }

    /// Accept the description verbatim. Blank text is rejected.
    pub fn enter_description(&self, description: &str) -> Result<NegotiationState> {
        match self {
            NegotiationState::EnteringDescription {
                initiator_business,
                partner_business,
            } => {
                if description.trim().is_empty() {
                    return Err(TycoonError::invalid("description cannot be empty"));
                }
                Ok(NegotiationState::EnteringAmount {
                    initiator_business: *initiator_business,
                    partner_business: *partner_business,
                    description: description.to_string(),
                })
            }
            other => Err(other.unexpected("enter a description")),
        }
    }

    /// Build the proposal from a validated amount and the freshly resolved
    /// partner.
    pub fn enter_amount(&self, initiator: UserId, amount: Money, partner: &Business) -> Result<NegotiationState> {
        match self {
            NegotiationState::EnteringAmount {
                initiator_business,
                partner_business,
                description,
            } => {
                if amount <= 0 {
                    return Err(TycoonError::invalid(format!(
                        "amount must be greater than 0, got {}",
                        amount
                    )));
                }
                if partner.id != *partner_business {
                    return Err(TycoonError::invalid(format!(
                        "business {} is not the selected partner",
                        partner.id
                    )));
                }
                Ok(NegotiationState::AwaitingInitiatorConfirm {
                    proposal: ContractProposal {
                        id: Uuid::new_v4(),
                        initiator,
                        initiator_business: *initiator_business,
                        partner_business: *partner_business,
                        partner_name: partner.name.clone(),
                        description: description.clone(),
                        amount,
                        created_at: Utc::now(),
                    },
                })
            }
            other => Err(other.unexpected("enter an amount")),
        }
    }

    /// Initiator confirmed; the proposal goes to the partner.
    pub fn confirm(&self) -> Result<NegotiationState> {
        match self {
            NegotiationState::AwaitingInitiatorConfirm { proposal } => {
                Ok(NegotiationState::AwaitingPartnerConfirm {
                    proposal: proposal.clone(),
                })
            }
            other => Err(other.unexpected("confirm")),
        }
    }

    /// Partner approved and the transfer went through.
    pub fn settle(&self, initiator_budget: Money, partner_budget: Money) -> Result<NegotiationState> {
        match self {
            NegotiationState::AwaitingPartnerConfirm { proposal } => Ok(NegotiationState::Settled {
                proposal: proposal.clone(),
                initiator_budget,
                partner_budget,
            }),
            other => Err(other.unexpected("settle")),
        }
    }

    /// Partner declined, or the settlement could not be applied.
    pub fn reject(&self, reason: impl Into<String>) -> Result<NegotiationState> {
        match self {
            NegotiationState::AwaitingPartnerConfirm { proposal } => Ok(NegotiationState::Rejected {
                proposal: proposal.clone(),
                reason: reason.into(),
            }),
            other => Err(other.unexpected("reject")),
        }
    }

    /// Withdraw from any non-terminal state.
    pub fn cancel(&self) -> Result<NegotiationState> {
        if self.is_terminal() {
            return Err(self.unexpected("cancel"));
        }
        Ok(NegotiationState::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partner() -> Business {
        Business {
            id: BusinessId(2),
            business_type: "factory".into(),
            name: "Acme".into(),
            budget: 0,
            monthly_expense: 0,
            income: 0,
            cost: 0,
        }
    }

    fn awaiting_partner() -> NegotiationState {
        NegotiationState::start(BusinessId(1))
            .select_partner(BusinessId(2))
            .unwrap()
            .enter_description("Deliver steel")
            .unwrap()
            .enter_amount(UserId(1), 300, &partner())
            .unwrap()
            .confirm()
            .unwrap()
    }

    #[test]
    fn test_happy_path() {
        let state = awaiting_partner();
        let proposal = state.proposal().unwrap().clone();
        assert_eq!(proposal.amount, 300);
        assert_eq!(proposal.partner_name, "Acme");
        assert_eq!(proposal.description, "Deliver steel");

        let settled = state.settle(700, 800).unwrap();
        assert!(settled.is_terminal());
        assert_eq!(settled.proposal(), Some(&proposal));
    }

    #[test]
    fn test_invalid_input_keeps_state() {
        let selecting = NegotiationState::start(BusinessId(1));
        assert!(matches!(
            selecting.select_partner(BusinessId(1)),
            Err(TycoonError::InvalidInput(_))
        ));

        let describing = selecting.select_partner(BusinessId(2)).unwrap();
        assert!(describing.enter_description("   ").is_err());

        let amount = describing.enter_description("x").unwrap();
        assert!(matches!(
            amount.enter_amount(UserId(1), 0, &partner()),
            Err(TycoonError::InvalidInput(_))
        ));
        assert_eq!(amount.name(), "entering_amount");
    }

    #[test]
    fn test_out_of_order_steps() {
        let err = NegotiationState::Idle.confirm().unwrap_err();
        assert_eq!(
            err,
            TycoonError::InvalidTransition {
                state: "idle".into(),
                action: "confirm".into()
            }
        );
        assert!(NegotiationState::start(BusinessId(1)).settle(0, 0).is_err());
    }

    #[test]
    fn test_cancel_only_from_non_terminal() {
        assert_eq!(
            awaiting_partner().cancel().unwrap(),
            NegotiationState::Cancelled
        );
        let rejected = awaiting_partner().reject("declined").unwrap();
        assert!(rejected.cancel().is_err());
        assert!(NegotiationState::Cancelled.cancel().is_err());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(NegotiationState::start(BusinessId(4))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"state": "selecting_partner", "initiator_business": 4})
        );
    }
}
