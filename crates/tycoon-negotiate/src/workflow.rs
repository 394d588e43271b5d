//! Drives negotiations against the ledger.
//!
//! Sessions are keyed by initiator and hold no lock between steps; a step
//! only serializes against other steps of the same negotiation. Funds move
//! exclusively in [`ContractWorkflow::respond`], through the ledger transfer,
//! which re-checks the initiator's balance under the account locks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use tycoon_core::{parse_amount, Business, BusinessId, Result, TycoonError, UserId};
use tycoon_ledger::{Ledger, LockTable, Notifier};
use tycoon_store::AccountStore;
use uuid::Uuid;

use crate::protocol::{ContractProposal, NegotiationCommand, NegotiationReply, PartnerOption};
use crate::session::NegotiationState;

/// Registry of in-progress negotiations plus the steps that advance them.
pub struct ContractWorkflow {
    ledger: Arc<Ledger>,
    notifier: Arc<dyn Notifier>,
    /// Only active (non-idle, non-terminal) states are kept.
    sessions: RwLock<HashMap<UserId, NegotiationState>>,
    steps: LockTable<UserId>,
}

impl ContractWorkflow {
    pub fn new(ledger: Arc<Ledger>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ledger,
            notifier,
            sessions: RwLock::new(HashMap::new()),
            steps: LockTable::new(),
        }
    }

    /// Current state of `initiator`'s negotiation.
    pub async fn state(&self, initiator: UserId) -> NegotiationState {
        self.sessions
            .read()
            .await
            .get(&initiator)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of negotiations in progress.
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Proposals waiting for approval by an owner of `business_id`.
    pub async fn pending_for(&self, business_id: BusinessId) -> Vec<ContractProposal> {
        let sessions = self.sessions.read().await;
        let mut pending: Vec<ContractProposal> = sessions
            .values()
            .filter_map(|state| match state {
                NegotiationState::AwaitingPartnerConfirm { proposal }
                    if proposal.partner_business == business_id =>
                {
                    Some(proposal.clone())
                }
                _ => None,
            })
            .collect();
        pending.sort_by_key(|p| p.created_at);
        pending
    }

    async fn store_state(&self, initiator: UserId, state: &NegotiationState) {
        let mut sessions = self.sessions.write().await;
        if state.is_active() {
            sessions.insert(initiator, state.clone());
        } else {
            sessions.remove(&initiator);
        }
    }

    async fn owned_business(&self, user_id: UserId) -> Result<Business> {
        let business_id = self
            .ledger
            .store()
            .get_user(user_id)
            .await?
            .and_then(|u| u.business_id)
            .ok_or(TycoonError::NoBusiness { user_id })?;
        self.ledger.business(business_id).await
    }

    async fn notify_owners(&self, business_id: BusinessId, text: String) {
        match self.ledger.store().owners_of(business_id).await {
            Ok(owners) => {
                for owner in owners {
                    self.notifier.notify_user(owner.id, text.clone());
                }
            }
            Err(err) => warn!(business_id = %business_id, error = %err, "Could not resolve owners to notify"),
        }
    }

    /// Dispatch one dialog command from `user_id`.
    pub async fn handle(&self, user_id: UserId, command: NegotiationCommand) -> Result<NegotiationReply> {
        match command {
            NegotiationCommand::Start => {
                let partners = self.start(user_id).await?;
                let prompt = if partners.is_empty() {
                    "There are no other companies to contract with yet"
                } else {
                    "Choose the company you want to contract with"
                };
                Ok(NegotiationReply::new(self.state(user_id).await, prompt).with_partners(partners))
            }
            NegotiationCommand::SelectPartner { business_id } => {
                let state = self.select_partner(user_id, business_id).await?;
                Ok(NegotiationReply::new(state, "Describe the contract"))
            }
            NegotiationCommand::EnterDescription { description } => {
                let state = self.enter_description(user_id, &description).await?;
                Ok(NegotiationReply::new(state, "Enter the contract amount"))
            }
            NegotiationCommand::EnterAmount { amount } => {
                let state = self.enter_amount(user_id, &amount).await?;
                let prompt = match state.proposal() {
                    Some(proposal) => format!("{}\nConfirm?", proposal.summary()),
                    None => String::new(),
                };
                Ok(NegotiationReply::new(state, prompt))
            }
            NegotiationCommand::Confirm => {
                let proposal = self.confirm(user_id).await?;
                Ok(NegotiationReply::new(
                    self.state(user_id).await,
                    format!("Proposal sent to {}", proposal.partner_name),
                ))
            }
            NegotiationCommand::Respond {
                proposal_id,
                approve,
            } => {
                let state = self.respond(user_id, proposal_id, approve).await?;
                let prompt = match &state {
                    NegotiationState::Settled { partner_budget, .. } => {
                        format!("Contract settled. Your budget: {}", partner_budget)
                    }
                    NegotiationState::Rejected { reason, .. } => format!("Contract rejected: {}", reason),
                    _ => String::new(),
                };
                Ok(NegotiationReply::new(state, prompt))
            }
            NegotiationCommand::Cancel => {
                let state = self.cancel(user_id).await?;
                Ok(NegotiationReply::new(state, "Contract cancelled"))
            }
        }
    }

    /// Begin a negotiation, replacing any in progress, and list the
    /// counterparties that can approve a contract.
    #[instrument(skip(self))]
    pub async fn start(&self, initiator: UserId) -> Result<Vec<PartnerOption>> {
        let _step = self.steps.lock(initiator).await;
        let own = self.owned_business(initiator).await?;

        let mut owned: Vec<BusinessId> = self
            .ledger
            .store()
            .list_users()
            .await?
            .into_iter()
            .filter_map(|u| u.business_id)
            .filter(|id| *id != own.id)
            .collect();
        owned.sort();
        owned.dedup();

        let partners = self
            .ledger
            .store()
            .list_businesses()
            .await?
            .iter()
            .filter(|b| owned.binary_search(&b.id).is_ok())
            .map(PartnerOption::from)
            .collect();

        let previous = self.state(initiator).await;
        self.store_state(initiator, &NegotiationState::start(own.id))
            .await;
        self.withdraw_pending(&previous).await;
        Ok(partners)
    }

    /// Pick the counterparty. An unknown partner aborts the negotiation.
    #[instrument(skip(self))]
    pub async fn select_partner(&self, initiator: UserId, partner: BusinessId) -> Result<NegotiationState> {
        let _step = self.steps.lock(initiator).await;
        let current = self.state(initiator).await;
        let next = current.select_partner(partner)?;

        if let Err(err) = self.resolve_partner(partner).await {
            self.store_state(initiator, &NegotiationState::Idle).await;
            return Err(err);
        }
        self.store_state(initiator, &next).await;
        Ok(next)
    }

    /// A partner must exist and have an owner who can approve.
    async fn resolve_partner(&self, partner: BusinessId) -> Result<Business> {
        let business = self.ledger.business(partner).await?;
        if self.ledger.store().owners_of(partner).await?.is_empty() {
            return Err(TycoonError::not_found("Owner of business", partner));
        }
        Ok(business)
    }

    #[instrument(skip(self, description))]
    pub async fn enter_description(&self, initiator: UserId, description: &str) -> Result<NegotiationState> {
        let _step = self.steps.lock(initiator).await;
        let next = self.state(initiator).await.enter_description(description)?;
        self.store_state(initiator, &next).await;
        Ok(next)
    }

    /// Parse the raw amount and build the proposal. Invalid text leaves the
    /// state unchanged; a vanished partner aborts the negotiation.
    #[instrument(skip(self))]
    pub async fn enter_amount(&self, initiator: UserId, raw: &str) -> Result<NegotiationState> {
        let _step = self.steps.lock(initiator).await;
        let current = self.state(initiator).await;
        let partner_business = match &current {
            NegotiationState::EnteringAmount {
                partner_business, ..
            } => *partner_business,
            other => return Err(TycoonError::transition(other.name(), "enter an amount")),
        };
        let amount = parse_amount(raw)?;

        let partner = match self.resolve_partner(partner_business).await {
            Ok(partner) => partner,
            Err(err) => {
                self.store_state(initiator, &NegotiationState::Idle).await;
                return Err(err);
            }
        };
        let next = current.enter_amount(initiator, amount, &partner)?;
        self.store_state(initiator, &next).await;
        Ok(next)
    }

    /// Check the initiator's budget and forward the proposal to the partner.
    ///
    /// An uncovered amount aborts the negotiation without contacting the
    /// partner.
    #[instrument(skip(self))]
    pub async fn confirm(&self, initiator: UserId) -> Result<ContractProposal> {
        let _step = self.steps.lock(initiator).await;
        let current = self.state(initiator).await;
        let next = current.confirm()?;
        let proposal = match next.proposal() {
            Some(proposal) => proposal.clone(),
            None => return Err(TycoonError::transition(current.name(), "confirm")),
        };

        let payer = match self.ledger.business(proposal.initiator_business).await {
            Ok(payer) => payer,
            Err(err) => {
                self.store_state(initiator, &NegotiationState::Idle).await;
                return Err(err);
            }
        };
        if !payer.can_cover(proposal.amount) {
            self.store_state(initiator, &NegotiationState::Idle).await;
            return Err(TycoonError::InsufficientFunds {
                business_id: payer.id,
                available: payer.budget,
                required: proposal.amount,
            });
        }

        self.store_state(initiator, &next).await;
        self.notify_owners(proposal.partner_business, proposal.offer_text(&payer.name))
            .await;

        info!(proposal_id = %proposal.id, partner = %proposal.partner_business, amount = proposal.amount, "Proposal forwarded");
        Ok(proposal)
    }

    /// Partner's answer to a forwarded proposal.
    ///
    /// `responder` must own the partner business. Approval runs the ledger
    /// transfer; an uncovered amount resolves to `Rejected`. A store failure
    /// keeps the proposal pending so the approval can be retried.
    #[instrument(skip(self))]
    pub async fn respond(&self, responder: UserId, proposal_id: Uuid, approve: bool) -> Result<NegotiationState> {
        let initiator = self
            .sessions
            .read()
            .await
            .iter()
            .find_map(|(initiator, state)| match state {
                NegotiationState::AwaitingPartnerConfirm { proposal } if proposal.id == proposal_id => {
                    Some(*initiator)
                }
                _ => None,
            })
            .ok_or_else(|| TycoonError::not_found("Proposal", proposal_id))?;

        let _step = self.steps.lock(initiator).await;
        let current = self.state(initiator).await;
        let proposal = match &current {
            NegotiationState::AwaitingPartnerConfirm { proposal } if proposal.id == proposal_id => proposal.clone(),
            _ => return Err(TycoonError::not_found("Proposal", proposal_id)),
        };

        let responder_owns_partner = self
            .ledger
            .store()
            .get_user(responder)
            .await?
            .map(|u| u.owns(proposal.partner_business))
            .unwrap_or(false);
        if !responder_owns_partner {
            return Err(TycoonError::Unauthorized { user_id: responder });
        }

        if !approve {
            let next = current.reject("declined by partner")?;
            self.store_state(initiator, &next).await;
            self.notifier.notify_user(
                initiator,
                format!("{} declined your contract: {}", proposal.partner_name, proposal.description),
            );
            info!(proposal_id = %proposal_id, "Proposal declined");
            return Ok(next);
        }

        let transfer = self
            .ledger
            .transfer_recorded(
                initiator,
                proposal.initiator_business,
                proposal.partner_business,
                proposal.amount,
            )
            .await;

        let next = match transfer {
            Ok(receipt) => {
                let next = current.settle(receipt.from.budget, receipt.to.budget)?;
                self.notify_owners(
                    proposal.initiator_business,
                    format!(
                        "Contract with {} settled: paid {}. Your budget: {}",
                        receipt.to.name, proposal.amount, receipt.from.budget
                    ),
                )
                .await;
                self.notify_owners(
                    proposal.partner_business,
                    format!(
                        "Contract with {} settled: received {}. Your budget: {}",
                        receipt.from.name, proposal.amount, receipt.to.budget
                    ),
                )
                .await;
                info!(proposal_id = %proposal_id, amount = proposal.amount, "Contract settled");
                next
            }
            Err(err @ TycoonError::InsufficientFunds { .. }) => {
                let next = current.reject(err.to_string())?;
                let text = format!(
                    "Contract '{}' could not be settled: {}",
                    proposal.description, err
                );
                self.notify_owners(proposal.initiator_business, text.clone())
                    .await;
                self.notify_owners(proposal.partner_business, text).await;
                warn!(proposal_id = %proposal_id, "Contract settlement not covered");
                next
            }
            Err(err) => {
                warn!(proposal_id = %proposal_id, error = %err, "Contract settlement failed, proposal kept");
                return Err(err);
            }
        };

        self.store_state(initiator, &next).await;
        Ok(next)
    }

    /// Withdraw the initiator's negotiation.
    #[instrument(skip(self))]
    pub async fn cancel(&self, initiator: UserId) -> Result<NegotiationState> {
        let _step = self.steps.lock(initiator).await;
        let current = self.state(initiator).await;
        if current == NegotiationState::Idle {
            return Err(TycoonError::transition(current.name(), "cancel"));
        }
        let next = current.cancel()?;
        self.store_state(initiator, &next).await;

        self.withdraw_pending(&current).await;
        Ok(next)
    }

    /// Tell the partner that a proposal it was asked to approve is gone.
    async fn withdraw_pending(&self, previous: &NegotiationState) {
        if let NegotiationState::AwaitingPartnerConfirm { proposal } = previous {
            self.notify_owners(
                proposal.partner_business,
                format!("The contract offer '{}' was withdrawn", proposal.description),
            )
            .await;
        }
    }
}
