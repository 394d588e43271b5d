use std::sync::Arc;

use tycoon_core::{AuditEventType, AuditFilter, Business, BusinessId, Notification, Recipient, TycoonError, UserId};
use tycoon_ledger::{BroadcastNotifier, Ledger};
use tycoon_negotiate::{ContractWorkflow, NegotiationCommand, NegotiationState};
use tycoon_store::{AccountStore, InMemoryAccountStore};

const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);
const MALLORY: UserId = UserId(3);

struct World {
    store: Arc<InMemoryAccountStore>,
    ledger: Arc<Ledger>,
    notifier: Arc<BroadcastNotifier>,
    workflow: ContractWorkflow,
    alice_co: BusinessId,
    bob_co: BusinessId,
}

async fn world() -> World {
    let store = Arc::new(InMemoryAccountStore::new());
    let mut ids = Vec::new();
    for (owner, name, budget) in [(ALICE, "Alpha", 1000), (BOB, "Beta", 500)] {
        let business = store
            .create_business(
                Business::builder()
                    .business_type("logistics")
                    .name(name)
                    .budget(budget)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        store.ensure_user(owner).await.unwrap();
        store.assign_business(owner, business.id).await.unwrap();
        ids.push(business.id);
    }
    store.ensure_user(MALLORY).await.unwrap();

    let notifier = Arc::new(BroadcastNotifier::default());
    let ledger = Arc::new(Ledger::new(store.clone()));
    let workflow = ContractWorkflow::new(ledger.clone(), notifier.clone());
    World {
        store,
        ledger,
        notifier,
        workflow,
        alice_co: ids[0],
        bob_co: ids[1],
    }
}

/// Drive Alice's negotiation up to the partner's decision.
async fn propose(world: &World, amount: &str) -> uuid::Uuid {
    let w = &world.workflow;
    w.handle(ALICE, NegotiationCommand::Start).await.unwrap();
    w.handle(
        ALICE,
        NegotiationCommand::SelectPartner {
            business_id: world.bob_co,
        },
    )
    .await
    .unwrap();
    w.handle(
        ALICE,
        NegotiationCommand::EnterDescription {
            description: "Ship 30 pallets".into(),
        },
    )
    .await
    .unwrap();
    let reply = w
        .handle(
            ALICE,
            NegotiationCommand::EnterAmount {
                amount: amount.into(),
            },
        )
        .await
        .unwrap();
    assert!(reply.prompt.contains("Contract with Beta"));
    let proposal = w.confirm(ALICE).await.unwrap();
    proposal.id
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

#[tokio::test]
async fn approved_contract_transfers_and_notifies_both_parties() {
    let world = world().await;
    let mut rx = world.notifier.subscribe();

    let proposal_id = propose(&world, "300").await;
    let offer = drain(&mut rx);
    assert_eq!(offer.len(), 1);
    assert_eq!(offer[0].recipient, Recipient::User(BOB));
    assert!(offer[0].text.contains(&proposal_id.to_string()));
    assert_eq!(world.workflow.pending_for(world.bob_co).await.len(), 1);

    let reply = world
        .workflow
        .handle(
            BOB,
            NegotiationCommand::Respond {
                proposal_id,
                approve: true,
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        reply.state,
        NegotiationState::Settled {
            initiator_budget: 700,
            partner_budget: 800,
            ..
        }
    ));

    assert_eq!(world.ledger.business(world.alice_co).await.unwrap().budget, 700);
    assert_eq!(world.ledger.business(world.bob_co).await.unwrap().budget, 800);
    assert_eq!(world.workflow.state(ALICE).await, NegotiationState::Idle);

    let settled = drain(&mut rx);
    let recipients: Vec<_> = settled.iter().map(|n| n.recipient).collect();
    assert_eq!(recipients, vec![Recipient::User(ALICE), Recipient::User(BOB)]);
    assert!(settled[0].text.contains("Your budget: 700"));
    assert!(settled[1].text.contains("Your budget: 800"));

    let events = world.store.audit_events(&AuditFilter::default()).await.unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(kinds, vec![AuditEventType::TransferOut, AuditEventType::TransferIn]);
}

#[tokio::test]
async fn balance_drop_between_confirm_and_approval_rejects() {
    let world = world().await;
    let proposal_id = propose(&world, "800").await;

    // Alice spends most of her budget while the offer is pending.
    world.ledger.debit(world.alice_co, 500).await.unwrap();

    let state = world.workflow.respond(BOB, proposal_id, true).await.unwrap();
    match state {
        NegotiationState::Rejected { reason, .. } => assert!(reason.contains("Insufficient funds")),
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(world.ledger.business(world.alice_co).await.unwrap().budget, 500);
    assert_eq!(world.ledger.business(world.bob_co).await.unwrap().budget, 500);
    assert_eq!(world.workflow.active_count().await, 0);
}

#[tokio::test]
async fn decline_moves_no_funds() {
    let world = world().await;
    let mut rx = world.notifier.subscribe();
    let proposal_id = propose(&world, "100").await;
    drain(&mut rx);

    let state = world.workflow.respond(BOB, proposal_id, false).await.unwrap();
    assert!(matches!(state, NegotiationState::Rejected { .. }));
    assert_eq!(world.ledger.business(world.alice_co).await.unwrap().budget, 1000);

    let notes = drain(&mut rx);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].recipient, Recipient::User(ALICE));
    assert!(notes[0].text.contains("declined"));
}

#[tokio::test]
async fn only_partner_owner_may_respond() {
    let world = world().await;
    let proposal_id = propose(&world, "100").await;

    for intruder in [MALLORY, ALICE] {
        assert!(matches!(
            world.workflow.respond(intruder, proposal_id, true).await,
            Err(TycoonError::Unauthorized { .. })
        ));
    }
    assert!(matches!(
        world.workflow.respond(BOB, uuid::Uuid::new_v4(), true).await,
        Err(TycoonError::NotFound { .. })
    ));
    assert_eq!(world.workflow.state(ALICE).await.name(), "awaiting_partner_confirm");
}

#[tokio::test]
async fn store_failure_keeps_proposal_pending() {
    let world = world().await;
    let proposal_id = propose(&world, "300").await;

    world.store.fail_next_commits(1);
    let err = world.workflow.respond(BOB, proposal_id, true).await.unwrap_err();
    assert!(matches!(err, TycoonError::StoreFailure { .. }));
    assert_eq!(world.ledger.business(world.alice_co).await.unwrap().budget, 1000);
    assert_eq!(world.workflow.state(ALICE).await.name(), "awaiting_partner_confirm");

    let state = world.workflow.respond(BOB, proposal_id, true).await.unwrap();
    assert!(matches!(state, NegotiationState::Settled { .. }));
}

#[tokio::test]
async fn cancel_withdraws_pending_offer() {
    let world = world().await;
    let mut rx = world.notifier.subscribe();
    let proposal_id = propose(&world, "100").await;
    drain(&mut rx);

    let reply = world
        .workflow
        .handle(ALICE, NegotiationCommand::Cancel)
        .await
        .unwrap();
    assert_eq!(reply.state, NegotiationState::Cancelled);

    let notes = drain(&mut rx);
    assert_eq!(notes[0].recipient, Recipient::User(BOB));
    assert!(matches!(
        world.workflow.respond(BOB, proposal_id, true).await,
        Err(TycoonError::NotFound { .. })
    ));
}

#[tokio::test]
async fn restart_withdraws_pending_offer() {
    let world = world().await;
    let mut rx = world.notifier.subscribe();
    let proposal_id = propose(&world, "100").await;
    drain(&mut rx);

    let reply = world
        .workflow
        .handle(ALICE, NegotiationCommand::Start)
        .await
        .unwrap();
    assert_eq!(reply.state.name(), "selecting_partner");

    let notes = drain(&mut rx);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].recipient, Recipient::User(BOB));
    assert_eq!(notes[0].text, "The contract offer 'Ship 30 pallets' was withdrawn");
    assert!(world.workflow.pending_for(world.bob_co).await.is_empty());
    assert!(matches!(
        world.workflow.respond(BOB, proposal_id, true).await,
        Err(TycoonError::NotFound { .. })
    ));
}

#[tokio::test]
async fn self_contract_is_rejected() {
    let world = world().await;
    world.workflow.start(ALICE).await.unwrap();
    assert!(matches!(
        world.workflow.select_partner(ALICE, world.alice_co).await,
        Err(TycoonError::InvalidInput(_))
    ));
    assert_eq!(world.workflow.state(ALICE).await.name(), "selecting_partner");
}
