use std::sync::Arc;

use futures::future::join_all;
use tycoon_core::{AuditEventType, AuditFilter, Business, BusinessId, Money, NewItem, TycoonError, UserId};
use tycoon_ledger::{NullNotifier, Services};
use tycoon_store::{AccountStore, InMemoryAccountStore};

async fn provision(store: &InMemoryAccountStore, owner: Option<i64>, budget: Money, expense: Money) -> BusinessId {
    let business = store
        .create_business(
            Business::builder()
                .business_type("trader")
                .budget(budget)
                .monthly_expense(expense)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    if let Some(owner) = owner {
        store.ensure_user(UserId(owner)).await.unwrap();
        store.assign_business(UserId(owner), business.id).await.unwrap();
    }
    business.id
}

fn services(store: &Arc<InMemoryAccountStore>) -> Services {
    Services::new(store.clone(), Arc::new(NullNotifier))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_debits_never_overdraw() {
    let store = Arc::new(InMemoryAccountStore::new());
    let account = provision(&store, None, 100, 0).await;
    let services = services(&store);

    let attempts = (0..10).map(|_| {
        let ledger = services.ledger.clone();
        tokio::spawn(async move { ledger.debit(account, 30).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(TycoonError::InsufficientFunds { .. })))
        .count();
    assert_eq!(succeeded, 3);
    assert_eq!(rejected, 7);

    let business = services.ledger.business(account).await.unwrap();
    assert_eq!(business.budget, 10);
    assert_eq!(business.cost, 90);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn opposite_transfers_conserve_money_without_deadlock() {
    let store = Arc::new(InMemoryAccountStore::new());
    let a = provision(&store, Some(1), 1000, 0).await;
    let b = provision(&store, Some(2), 1000, 0).await;
    let services = services(&store);

    let transfers = (0..100).map(|i| {
        let ledger = services.ledger.clone();
        tokio::spawn(async move {
            if i % 2 == 0 {
                ledger.transfer(a, b, 7).await
            } else {
                ledger.transfer(b, a, 5).await
            }
        })
    });
    let all = tokio::time::timeout(std::time::Duration::from_secs(10), join_all(transfers))
        .await
        .expect("transfers deadlocked");
    assert!(all.into_iter().all(|r| r.unwrap().is_ok()));

    let a = services.ledger.business(a).await.unwrap();
    let b = services.ledger.business(b).await.unwrap();
    assert_eq!(a.budget + b.budget, 2000);
    assert_eq!(a.budget, 1000 - 50 * 7 + 50 * 5);
}

#[tokio::test]
async fn transfer_scenario_with_audit() {
    let store = Arc::new(InMemoryAccountStore::new());
    let a = provision(&store, Some(1), 1000, 0).await;
    let b = provision(&store, Some(2), 500, 0).await;
    let services = services(&store);

    let receipt = services
        .ledger
        .transfer_recorded(UserId(1), a, b, 300)
        .await
        .unwrap();
    assert_eq!((receipt.from.budget, receipt.to.budget), (700, 800));

    let out = store
        .audit_events(&AuditFilter::event_type(AuditEventType::TransferOut))
        .await
        .unwrap();
    let incoming = store
        .audit_events(&AuditFilter::event_type(AuditEventType::TransferIn))
        .await
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(incoming.len(), 1);
    assert!(services.audit.verify().await.unwrap().intact);
}

#[tokio::test]
async fn transfer_store_failure_leaves_both_accounts_untouched() {
    let store = Arc::new(InMemoryAccountStore::new());
    let a = provision(&store, Some(1), 1000, 0).await;
    let b = provision(&store, Some(2), 500, 0).await;
    let services = services(&store);

    store.fail_next_commits(1);
    let err = services
        .ledger
        .transfer_recorded(UserId(1), a, b, 300)
        .await
        .unwrap_err();
    assert!(matches!(err, TycoonError::StoreFailure { .. }));
    assert!(err.is_recoverable());

    assert_eq!(services.ledger.business(a).await.unwrap().budget, 1000);
    assert_eq!(services.ledger.business(b).await.unwrap().budget, 500);
    assert!(store.audit_events(&AuditFilter::default()).await.unwrap().is_empty());

    // Retrying succeeds.
    services.ledger.transfer_recorded(UserId(1), a, b, 300).await.unwrap();
    assert_eq!(services.ledger.business(a).await.unwrap().budget, 700);
}

#[tokio::test]
async fn settlement_scenario_insolvent_account() {
    let store = Arc::new(InMemoryAccountStore::new());
    let solvent = provision(&store, Some(1), 400, 150).await;
    let c = provision(&store, Some(2), 50, 100).await;
    let services = services(&store);

    let report = services.settlement.run_monthly_settlement().await.unwrap();
    assert_eq!(report.total, 150);
    assert_eq!(report.failed, 1);

    assert_eq!(services.ledger.business(c).await.unwrap().budget, 50);
    assert_eq!(services.ledger.business(solvent).await.unwrap().budget, 250);

    let failed = services.audit.for_business(c).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].event_type, AuditEventType::ExpenseFailed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn checkout_and_settlement_race_keeps_budget_non_negative() {
    let store = Arc::new(InMemoryAccountStore::new());
    let account = provision(&store, Some(1), 100, 60).await;
    let category = store.create_category("Parts").await.unwrap();
    let sub = store.create_subcategory(category.id, "Bolts").await.unwrap();
    let bolt = store
        .create_item(NewItem {
            name: "Bolt".into(),
            price: 60,
            weight: 1,
            subcategory_id: sub.id,
        })
        .await
        .unwrap();
    let services = services(&store);
    services.checkout.add_to_cart(UserId(1), bolt.id, 1).await.unwrap();

    let checkout = {
        let checkout = services.checkout.clone();
        tokio::spawn(async move { checkout.checkout(UserId(1)).await })
    };
    let settlement = {
        let settlement = services.settlement.clone();
        tokio::spawn(async move { settlement.run_monthly_settlement().await })
    };
    let checkout = checkout.await.unwrap();
    let report = settlement.await.unwrap().unwrap();

    // Exactly one of the two 60-unit debits fits into the 100 budget.
    let business = services.ledger.business(account).await.unwrap();
    assert_eq!(business.budget, 40);
    assert_eq!(checkout.is_ok() as usize + report.settled, 1);
}

#[tokio::test]
async fn checkout_scenario_and_inflation() {
    let store = Arc::new(InMemoryAccountStore::new());
    provision(&store, Some(1), 100, 0).await;
    let category = store.create_category("Office").await.unwrap();
    let sub = store.create_subcategory(category.id, "Paper").await.unwrap();
    let x = store
        .create_item(NewItem { name: "Ream".into(), price: 20, weight: 2, subcategory_id: sub.id })
        .await
        .unwrap();
    let y = store
        .create_item(NewItem { name: "Folder".into(), price: 15, weight: 1, subcategory_id: sub.id })
        .await
        .unwrap();
    let services = services(&store);

    services.checkout.add_to_cart(UserId(1), x.id, 3).await.unwrap();
    services.checkout.add_to_cart(UserId(1), y.id, 1).await.unwrap();
    let receipt = services.checkout.checkout(UserId(1)).await.unwrap();
    assert_eq!(receipt.summary.total, 75);
    assert_eq!(receipt.business.budget, 25);
    assert!(services.checkout.view_cart(UserId(1)).await.unwrap().is_empty());

    assert_eq!(services.pricing.apply_percentage_adjustment(15).await.unwrap(), 2);
    assert_eq!(services.catalog.item(x.id).await.unwrap().price, 23);
}
