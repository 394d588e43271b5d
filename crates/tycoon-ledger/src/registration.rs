//! User registration and business ownership.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use tycoon_core::{AuditEventType, AuditFilter, Business, BusinessId, Result, TycoonError, User, UserId};

use crate::ledger::Ledger;
use crate::notify::Notifier;

pub struct Registration {
    ledger: Arc<Ledger>,
    notifier: Arc<dyn Notifier>,
    /// Serializes ownership checks with the assignment that follows them.
    claims: Mutex<()>,
}

impl Registration {
    pub fn new(ledger: Arc<Ledger>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ledger,
            notifier,
            claims: Mutex::new(()),
        }
    }

    /// Create the user on first interaction. Idempotent.
    pub async fn register_user(&self, user_id: UserId) -> Result<User> {
        self.ledger.store().ensure_user(user_id).await
    }

    /// Businesses nobody owns yet.
    pub async fn unclaimed_businesses(&self) -> Result<Vec<Business>> {
        let owned: BTreeSet<BusinessId> = self
            .ledger
            .store()
            .list_users()
            .await?
            .into_iter()
            .filter_map(|u| u.business_id)
            .collect();
        Ok(self
            .ledger
            .store()
            .list_businesses()
            .await?
            .into_iter()
            .filter(|b| !owned.contains(&b.id))
            .collect())
    }

    /// Associate the user with an existing business nobody owns yet.
    #[instrument(skip(self))]
    pub async fn claim_business(&self, user_id: UserId, business_id: BusinessId) -> Result<User> {
        let _guard = self.claims.lock().await;
        self.claim_unowned(user_id, business_id).await
    }

    /// Caller holds `claims`.
    async fn claim_unowned(&self, user_id: UserId, business_id: BusinessId) -> Result<User> {
        self.ledger.business(business_id).await?;
        let user = self.ledger.store().ensure_user(user_id).await?;
        if let Some(current) = user.business_id {
            return Err(TycoonError::invalid(format!(
                "user {} is already registered with business {}",
                user_id, current
            )));
        }
        if !self.ledger.store().owners_of(business_id).await?.is_empty() {
            warn!(user_id = %user_id, business_id = %business_id, "Claim of an owned business rejected");
            return Err(TycoonError::invalid(format!(
                "business {} is already registered",
                business_id
            )));
        }
        self.ledger.store().assign_business(user_id, business_id).await
    }

    /// Claim a business, give it its display name and announce it.
    ///
    /// Registration happens once per user and once per business: a user who
    /// already owns a business, a business that already has an owner, and a
    /// business that was already named are all rejected.
    #[instrument(skip(self))]
    pub async fn complete_registration(
        &self,
        user_id: UserId,
        business_id: BusinessId,
        name: &str,
    ) -> Result<Business> {
        if name.trim().is_empty() {
            return Err(TycoonError::invalid("business name cannot be empty"));
        }
        let _guard = self.claims.lock().await;
        self.ledger.business(business_id).await?;
        let renames = self
            .ledger
            .store()
            .audit_events(&AuditFilter {
                business_id: Some(business_id),
                event_type: Some(AuditEventType::RenameBusiness),
                ..Default::default()
            })
            .await?;
        if !renames.is_empty() {
            return Err(TycoonError::invalid(format!(
                "business {} is already registered",
                business_id
            )));
        }
        self.claim_unowned(user_id, business_id).await?;

        let business = self
            .ledger
            .rename_business_recorded(user_id, business_id, name)
            .await?;

        info!(user_id = %user_id, business_id = %business_id, name = %business.name, "Registration completed");
        self.notifier
            .announce(format!("A new company appeared: {}", business.name));
        Ok(business)
    }

    /// The business the user owns.
    pub async fn my_business(&self, user_id: UserId) -> Result<Business> {
        let business_id = self
            .ledger
            .store()
            .get_user(user_id)
            .await?
            .and_then(|u| u.business_id)
            .ok_or(TycoonError::NoBusiness { user_id })?;
        self.ledger.business(business_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::BroadcastNotifier;
    use tycoon_core::Recipient;
    use tycoon_store::{AccountStore, InMemoryAccountStore};

    #[tokio::test]
    async fn test_full_registration() {
        let store = Arc::new(InMemoryAccountStore::new());
        let courier = store
            .create_business(Business::builder().business_type("courier").budget(100).build().unwrap())
            .await
            .unwrap();
        let bakery = store
            .create_business(Business::builder().business_type("bakery").build().unwrap())
            .await
            .unwrap();

        let notifier = Arc::new(BroadcastNotifier::default());
        let mut rx = notifier.subscribe();
        let registration = Registration::new(Arc::new(Ledger::new(store.clone())), notifier.clone());

        registration.register_user(UserId(9)).await.unwrap();
        assert!(matches!(
            registration.my_business(UserId(9)).await,
            Err(TycoonError::NoBusiness { .. })
        ));
        assert_eq!(registration.unclaimed_businesses().await.unwrap().len(), 2);

        let business = registration
            .complete_registration(UserId(9), courier.id, "Fast Feet")
            .await
            .unwrap();
        assert_eq!(business.name, "Fast Feet");
        assert_eq!(registration.my_business(UserId(9)).await.unwrap(), business);
        assert_eq!(registration.unclaimed_businesses().await.unwrap(), vec![bakery.clone()]);

        let announcement = rx.recv().await.unwrap();
        assert_eq!(announcement.recipient, Recipient::Channel);
        assert!(announcement.text.contains("Fast Feet"));

        let events = store
            .audit_events(&AuditFilter::event_type(AuditEventType::RenameBusiness))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);

        assert!(matches!(
            registration.complete_registration(UserId(9), bakery.id, "Second").await,
            Err(TycoonError::InvalidInput(_))
        ));
        assert!(matches!(
            registration.claim_business(UserId(9), BusinessId(404)).await,
            Err(TycoonError::NotFound { .. })
        ));
    }

    async fn registered_courier() -> (Arc<InMemoryAccountStore>, Registration, Business) {
        let store = Arc::new(InMemoryAccountStore::new());
        let courier = store
            .create_business(Business::builder().business_type("courier").build().unwrap())
            .await
            .unwrap();
        store
            .create_business(Business::builder().business_type("bakery").build().unwrap())
            .await
            .unwrap();
        let registration = Registration::new(
            Arc::new(Ledger::new(store.clone())),
            Arc::new(BroadcastNotifier::default()),
        );
        let courier = registration
            .complete_registration(UserId(1), courier.id, "Fast Feet")
            .await
            .unwrap();
        (store, registration, courier)
    }

    async fn rename_count(store: &InMemoryAccountStore) -> usize {
        store
            .audit_events(&AuditFilter::event_type(AuditEventType::RenameBusiness))
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_registration_cannot_be_repeated() {
        let (store, registration, courier) = registered_courier().await;

        assert!(matches!(
            registration.complete_registration(UserId(1), courier.id, "Renamed").await,
            Err(TycoonError::InvalidInput(_))
        ));
        assert_eq!(registration.my_business(UserId(1)).await.unwrap().name, "Fast Feet");
        assert_eq!(rename_count(&store).await, 1);
    }

    #[tokio::test]
    async fn test_owned_business_cannot_be_taken_over() {
        let (store, registration, courier) = registered_courier().await;

        assert!(matches!(
            registration.complete_registration(UserId(2), courier.id, "Hijacked").await,
            Err(TycoonError::InvalidInput(_))
        ));
        assert!(matches!(
            registration.claim_business(UserId(2), courier.id).await,
            Err(TycoonError::InvalidInput(_))
        ));

        let owners = store.owners_of(courier.id).await.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].id, UserId(1));
        assert_eq!(store.get_business(courier.id).await.unwrap().unwrap().name, "Fast Feet");
        assert_eq!(rename_count(&store).await, 1);
        assert!(matches!(
            registration.my_business(UserId(2)).await,
            Err(TycoonError::NoBusiness { .. })
        ));
    }
}
