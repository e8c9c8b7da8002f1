use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::category::EntryType;
use crate::models::user::User;
use crate::repositories::CategoryRepository;
use crate::services::category_service::CategoryError;

/// Prune idle entries once the map grows past this size
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// Caps the number of active categories of one type a user can see
pub struct QuotaEnforcer {
    category_repository: Arc<dyn CategoryRepository>,
}

impl QuotaEnforcer {
    pub fn new(category_repository: Arc<dyn CategoryRepository>) -> Self {
        Self {
            category_repository,
        }
    }

    /// Returns the current active count, or `QuotaExceeded` when one more
    /// active category would go over `user.category_limit`.
    ///
    /// Global categories count too.
    pub async fn ensure_capacity(
        &self,
        user: &User,
        category_type: EntryType,
    ) -> Result<i64, CategoryError> {
        let count = self
            .category_repository
            .count_active_visible(user.id, category_type)
            .await?;

        if count >= i64::from(user.category_limit) {
            tracing::info!(
                user_id = %user.id,
                category_type = %category_type,
                count,
                limit = user.category_limit,
                "Category quota reached"
            );
            return Err(CategoryError::QuotaExceeded {
                limit: user.category_limit,
            });
        }

        Ok(count)
    }
}

/// Per-user async locks serializing category mutations within this process.
///
/// Count-then-insert is not atomic at the store level, so two concurrent
/// creations for the same user could both pass the quota check. Holding the
/// user's lock across check and write closes that window for a single
/// instance.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and takes the user's lock; released when the guard drops
    pub async fn acquire(&self, user_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() > LOCK_PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(user_id).or_default().clone()
        };

        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::category::Category;
    use crate::models::user::NewUser;
    use crate::repositories::InMemoryStore;
    use std::time::Duration;

    fn user_with_limit(limit: i32) -> User {
        let mut user = NewUser {
            name: None,
            fname: "Quota".to_string(),
            lname: "Tester".to_string(),
            email: "quota@example.com".to_string(),
            password_hash: "hash".to_string(),
            timezone: None,
        }
        .into_user();
        user.category_limit = limit;
        user
    }

    #[tokio::test]
    async fn test_ensure_capacity_counts_owned_and_global() {
        let store = Arc::new(InMemoryStore::new());
        let user = user_with_limit(2);
        store.seed_global_category(EntryType::Expense, "Utilities");

        let enforcer = QuotaEnforcer::new(store.clone());
        assert_eq!(
            enforcer.ensure_capacity(&user, EntryType::Expense).await.unwrap(),
            1
        );

        store.insert_category(Category::new_owned(user.id, EntryType::Expense, "Rent", false));
        let result = enforcer.ensure_capacity(&user, EntryType::Expense).await;
        assert!(matches!(result, Err(CategoryError::QuotaExceeded { limit: 2 })));

        // Other type is unaffected
        assert!(enforcer.ensure_capacity(&user, EntryType::Income).await.is_ok());
    }

    #[tokio::test]
    async fn test_inactive_categories_do_not_count() {
        let store = Arc::new(InMemoryStore::new());
        let user = user_with_limit(1);
        let mut archived = Category::new_owned(user.id, EntryType::Income, "Bonus", false);
        archived.is_active = false;
        store.insert_category(archived);

        let enforcer = QuotaEnforcer::new(store);
        assert_eq!(
            enforcer.ensure_capacity(&user, EntryType::Income).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_user_lock_serializes_same_user() {
        let locks = Arc::new(UserLocks::new());
        let user_id = Uuid::new_v4();

        let guard = locks.acquire(user_id).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(user_id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // A different user is not blocked
        let _other = locks.acquire(Uuid::new_v4()).await;

        drop(guard);
        contender.await.unwrap();
    }
}
