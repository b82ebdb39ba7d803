use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::identifier::Identifier;
use super::repo::{BootstrapOutcome, ConflictField, StoreError, UserStore};
use super::repo_types::User;

/// In-process credential store. Every operation runs under one lock, which
/// makes the uniqueness check and the insert a single step.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, User>>, StoreError> {
        self.users
            .lock()
            .map_err(|_| StoreError::Internal(anyhow::anyhow!("user store lock poisoned")))
    }

    /// Drop a user outright. Account removal is not an auth operation; this
    /// exists for tooling and tests.
    pub fn remove(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.remove(&id))
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }
}

fn check_unique(users: &HashMap<Uuid, User>, user: &User) -> Result<(), StoreError> {
    for existing in users.values() {
        if existing.username == user.username {
            return Err(StoreError::Conflict(ConflictField::Username));
        }
        if user.identifier.is_some() && existing.identifier == user.identifier {
            return Err(StoreError::Conflict(ConflictField::Identifier));
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.lock()?;
        check_unique(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn create_first_admin(&self, user: &User) -> Result<BootstrapOutcome, StoreError> {
        let mut users = self.lock()?;
        if users.values().any(|u| u.is_admin) {
            return Ok(BootstrapOutcome::Closed);
        }
        check_unique(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(BootstrapOutcome::Created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .values()
            .find(|u| u.identifier.as_ref() == Some(identifier))
            .cloned())
    }

    async fn find_any_admin(&self) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .values()
            .filter(|u| u.is_admin)
            .min_by_key(|u| u.created_at)
            .cloned())
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.lock()?;
        let stored = users.get_mut(&user.id).ok_or(StoreError::Missing)?;
        stored.is_verified = stored.is_verified || user.is_verified;
        stored.otp = if stored.is_verified {
            None
        } else {
            user.otp.clone()
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::OffsetDateTime;

    use super::*;
    use crate::auth::repo_types::OtpChallenge;

    fn alice() -> User {
        User::pending(
            "alice".into(),
            "hash".into(),
            Identifier::Email("a@x.com".into()),
        )
    }

    #[tokio::test]
    async fn create_rejects_duplicate_username() {
        let store = MemoryUserStore::new();
        store.create(&alice()).await.unwrap();

        let mut other = alice();
        other.id = Uuid::new_v4();
        other.identifier = Some(Identifier::Email("b@x.com".into()));
        let err = store.create(&other).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ConflictField::Username)));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_identifier() {
        let store = MemoryUserStore::new();
        store.create(&alice()).await.unwrap();

        let bob = User::pending(
            "bob".into(),
            "hash".into(),
            Identifier::Email("a@x.com".into()),
        );
        let err = store.create(&bob).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ConflictField::Identifier)));
    }

    #[tokio::test]
    async fn admins_without_identifier_do_not_collide() {
        let store = MemoryUserStore::new();
        store
            .create(&User::admin("root".into(), "hash".into()))
            .await
            .unwrap();
        store
            .create(&User::admin("ops".into(), "hash".into()))
            .await
            .unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn identifier_uniqueness_is_per_kind() {
        let store = MemoryUserStore::new();
        let email = User::pending(
            "alice".into(),
            "hash".into(),
            Identifier::Email("5551234567".into()),
        );
        let mobile = User::pending(
            "bob".into(),
            "hash".into(),
            Identifier::Mobile("5551234567".into()),
        );
        store.create(&email).await.unwrap();
        store.create(&mobile).await.unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn poisoned_lock_is_reported() {
        let store = Arc::new(MemoryUserStore::new());
        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.users.lock().unwrap();
            panic!("poison the store");
        })
        .join();

        assert!(matches!(store.len(), Err(StoreError::Internal(_))));
        assert!(matches!(store.is_empty(), Err(StoreError::Internal(_))));
        assert!(matches!(store.remove(Uuid::new_v4()), Err(StoreError::Internal(_))));
        assert!(store.find_any_admin().await.is_err());
    }

    #[tokio::test]
    async fn lookups_return_none_when_absent() {
        let store = MemoryUserStore::new();
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
        assert!(store
            .find_by_identifier(&Identifier::Email("n@x.com".into()))
            .await
            .unwrap()
            .is_none());
        assert!(store.find_any_admin().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_never_unverifies() {
        let store = MemoryUserStore::new();
        let mut user = alice();
        user.is_verified = true;
        store.create(&user).await.unwrap();

        user.is_verified = false;
        store.save(&user).await.unwrap();
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.is_verified);
    }

    #[tokio::test]
    async fn save_missing_user_is_an_error() {
        let store = MemoryUserStore::new();
        let err = store.save(&alice()).await.unwrap_err();
        assert!(matches!(err, StoreError::Missing));
    }

    #[tokio::test]
    async fn stale_snapshot_cannot_restore_challenge_after_verification() {
        let store = MemoryUserStore::new();
        let mut user = alice();
        user.otp = Some(OtpChallenge {
            code: "111111".into(),
            expires_at: OffsetDateTime::now_utc() + time::Duration::minutes(10),
        });
        store.create(&user).await.unwrap();
        let mut stale = user.clone();

        user.is_verified = true;
        user.otp = None;
        store.save(&user).await.unwrap();

        stale.otp = Some(OtpChallenge {
            code: "222222".into(),
            expires_at: OffsetDateTime::now_utc() + time::Duration::minutes(10),
        });
        store.save(&stale).await.unwrap();

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.is_verified);
        assert!(stored.otp.is_none());
    }

    #[tokio::test]
    async fn concurrent_bootstrap_creates_one_admin() {
        let store = Arc::new(MemoryUserStore::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let admin = User::admin(format!("admin{i}"), "hash".into());
                store.create_first_admin(&admin).await.unwrap()
            }));
        }
        let mut created = 0;
        for h in handles {
            if h.await.unwrap() == BootstrapOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.len().unwrap(), 1);
    }
}
