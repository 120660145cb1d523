//! In-process lock store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::LockStore;
use crate::{
    lock::{AcquireOutcome, Lock, OwnerId, ResourceId},
    Result,
};

/// Lock store backed by a `HashMap` behind a single async mutex.
///
/// Each operation runs entirely inside one critical section.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    locks: Mutex<HashMap<ResourceId, Lock>>,
}

impl MemoryLockStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, expired ones included.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }

    /// Store a lock verbatim, bypassing acquire rules. Test seeding only.
    pub async fn insert_raw(&self, lock: Lock) {
        self.locks.lock().await.insert(lock.resource_id, lock);
    }
}

#[async_trait::async_trait]
impl LockStore for MemoryLockStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn try_acquire(&self, candidate: &Lock, now: DateTime<Utc>) -> Result<AcquireOutcome> {
        let mut locks = self.locks.lock().await;
        let current = locks.get(&candidate.resource_id).cloned();
        let outcome = AcquireOutcome::decide(current, candidate.clone(), now);
        if let AcquireOutcome::Granted { lock, .. } = &outcome {
            locks.insert(lock.resource_id, lock.clone());
        }
        drop(locks);
        Ok(outcome)
    }

    async fn delete_if_releasable(
        &self,
        resource_id: ResourceId,
        owner_id: &OwnerId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut locks = self.locks.lock().await;
        let releasable = locks
            .get(&resource_id)
            .is_some_and(|lock| lock.yields_to(owner_id, now));
        if releasable {
            locks.remove(&resource_id);
        }
        Ok(releasable)
    }

    async fn delete_if_expired(
        &self,
        resource_id: ResourceId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut locks = self.locks.lock().await;
        let expired = locks
            .get(&resource_id)
            .is_some_and(|lock| lock.is_expired_at(now));
        if expired {
            locks.remove(&resource_id);
        }
        Ok(expired)
    }

    async fn get(&self, resource_id: ResourceId) -> Result<Option<Lock>> {
        Ok(self.locks.lock().await.get(&resource_id).cloned())
    }

    async fn delete_all_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| !lock.is_expired_at(now));
        let removed = before.saturating_sub(locks.len());
        drop(locks);
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn list_live(&self, now: DateTime<Utc>) -> Result<Vec<Lock>> {
        let mut live: Vec<Lock> = self
            .locks
            .lock()
            .await
            .values()
            .filter(|lock| !lock.is_expired_at(now))
            .cloned()
            .collect();
        live.sort_by_key(|lock| lock.resource_id);
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::lock::{GrantKind, Owner};

    fn lock(id: i64, owner: &str, now: DateTime<Utc>) -> Lock {
        Lock::new(
            ResourceId::new(id),
            Owner::new(owner, owner),
            now,
            Duration::minutes(5),
        )
    }

    #[tokio::test]
    async fn test_denied_acquire_leaves_row_untouched() -> Result<()> {
        let store = MemoryLockStore::new();
        let now = Utc::now();
        let held = lock(1, "a", now);
        store.try_acquire(&held, now).await?;

        let outcome = store.try_acquire(&lock(1, "b", now), now).await?;
        assert_eq!(outcome, AcquireOutcome::Denied { holder: held.clone() });
        assert_eq!(store.get(ResourceId::new(1)).await?, Some(held));
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_row_is_replaced_fresh() -> Result<()> {
        let store = MemoryLockStore::new();
        let now = Utc::now();
        store.insert_raw(lock(1, "a", now - Duration::minutes(10))).await;

        let outcome = store.try_acquire(&lock(1, "b", now), now).await?;
        assert!(matches!(
            outcome,
            AcquireOutcome::Granted {
                kind: GrantKind::Fresh,
                ..
            }
        ));
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_if_expired_keeps_live_lock() -> Result<()> {
        let store = MemoryLockStore::new();
        let now = Utc::now();
        store.insert_raw(lock(1, "a", now)).await;

        assert!(!store.delete_if_expired(ResourceId::new(1), now).await?);
        assert!(!store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_live_sorted_and_filtered() -> Result<()> {
        let store = MemoryLockStore::new();
        let now = Utc::now();
        store.insert_raw(lock(3, "a", now)).await;
        store.insert_raw(lock(1, "b", now)).await;
        store.insert_raw(lock(2, "c", now - Duration::hours(1))).await;

        let ids: Vec<i64> = store
            .list_live(now)
            .await?
            .iter()
            .map(|l| l.resource_id.value())
            .collect();
        assert_eq!(ids, vec![1, 3]);
        Ok(())
    }
}
