//! Lock coordinator.
//!
//! Grants, extends, releases, inspects and expires edit locks on top of a
//! [`LockStore`]. Every decision that leads to a write is taken inside the
//! store's per-key atomic operation, so two concurrent acquires for the same
//! resource can never both be granted.
//!
//! Expiry is enforced lazily on every read path; the background sweeper
//! only reclaims storage.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    clock::{Clock, SystemClock},
    config::LockConfig,
    lock::{AcquireOutcome, GrantKind, Lock, Owner, OwnerId, ResourceId},
    store::LockStore,
    Error, Result,
};

/// Default lock timeout in seconds (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: i64 = 300;

/// Coordinates exclusive, time-bounded edit locks.
///
/// Cheap to clone; clones share the same store and clock.
#[derive(Clone)]
pub struct LockCoordinator {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl std::fmt::Debug for LockCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockCoordinator")
            .field("clock", &self.clock)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LockCoordinator {
    /// Create a coordinator with the default timeout and the system clock.
    #[must_use]
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            timeout: Duration::seconds(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create a coordinator from validated lock settings.
    pub fn from_config(store: Arc<dyn LockStore>, config: &LockConfig) -> Result<Self> {
        let secs = i64::try_from(config.lock_timeout_secs).map_err(|_| {
            Error::InvalidConfig(format!(
                "lock_timeout_secs out of range: {}",
                config.lock_timeout_secs
            ))
        })?;
        Self::new(store).with_timeout(Duration::seconds(secs))
    }

    /// Replace the lock timeout. It must be positive so every lock expires
    /// strictly after it was acquired.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout <= Duration::zero() {
            return Err(Error::InvalidConfig(format!(
                "lock timeout must be positive, got {}s",
                timeout.num_seconds()
            )));
        }
        self.timeout = timeout;
        Ok(self)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn LockStore> {
        &self.store
    }

    /// Current time, truncated to whole milliseconds to match store precision.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
    }

    /// Acquire or extend the lock on `resource_id` for `owner`.
    ///
    /// A live lock held by someone else yields [`AcquireOutcome::Denied`];
    /// only store failures are errors.
    pub async fn acquire(&self, resource_id: ResourceId, owner: &Owner) -> Result<AcquireOutcome> {
        let now = self.now();
        let candidate = Lock::new(resource_id, owner.clone(), now, self.timeout);

        let outcome = self.store.try_acquire(&candidate, now).await?;

        match &outcome {
            AcquireOutcome::Granted {
                kind: GrantKind::Fresh,
                lock,
            } => tracing::info!(
                resource_id = %resource_id,
                owner_id = %owner.id,
                expires_at = %lock.expires_at,
                "Acquired lock"
            ),
            AcquireOutcome::Granted {
                kind: GrantKind::Extended,
                lock,
            } => tracing::info!(
                resource_id = %resource_id,
                owner_id = %owner.id,
                expires_at = %lock.expires_at,
                "Extended lock"
            ),
            AcquireOutcome::Denied { holder } => tracing::warn!(
                resource_id = %resource_id,
                owner_id = %owner.id,
                holder_id = %holder.owner.id,
                expires_at = %holder.expires_at,
                "Resource is locked by another owner"
            ),
        }

        Ok(outcome)
    }

    /// Release the lock on `resource_id`.
    ///
    /// Removes the lock when `owner_id` holds it or it has already expired.
    /// Returns `false`, without touching anything, when there is no lock or
    /// another owner holds a live one.
    pub async fn release(&self, resource_id: ResourceId, owner_id: &OwnerId) -> Result<bool> {
        let now = self.now();

        if self
            .store
            .delete_if_releasable(resource_id, owner_id, now)
            .await?
        {
            tracing::info!(resource_id = %resource_id, owner_id = %owner_id, "Released lock");
            return Ok(true);
        }

        // Nothing was removed; read once more only to say why.
        match self.store.get(resource_id).await {
            Ok(Some(holder)) => tracing::warn!(
                resource_id = %resource_id,
                owner_id = %owner_id,
                holder_id = %holder.owner.id,
                "Refused to release lock held by another owner"
            ),
            Ok(None) => tracing::warn!(resource_id = %resource_id, "No lock found to release"),
            Err(e) => tracing::warn!(resource_id = %resource_id, error = %e, "Lock not released"),
        }

        Ok(false)
    }

    /// Current live lock on `resource_id`, if any.
    ///
    /// An expired lock found here is deleted and reported as absent.
    pub async fn inspect(&self, resource_id: ResourceId) -> Result<Option<Lock>> {
        let now = self.now();

        match self.store.get(resource_id).await? {
            Some(lock) if lock.is_expired_at(now) => {
                if self.store.delete_if_expired(resource_id, now).await? {
                    tracing::info!(resource_id = %resource_id, "Removed expired lock");
                }
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Remove every lock expired at `now`. Returns how many were removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let swept = self.store.delete_all_expired(now).await?;
        if swept > 0 {
            tracing::info!(swept, "Cleaned up expired locks");
        }
        Ok(swept)
    }

    /// All live locks, ordered by resource id.
    pub async fn active_locks(&self) -> Result<Vec<Lock>> {
        self.store.list_live(self.now()).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{clock::ManualClock, store::MemoryLockStore};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 22, 6, 58, 22)
            .single()
            .unwrap_or_default()
    }

    fn setup() -> (LockCoordinator, ManualClock, Arc<MemoryLockStore>) {
        let clock = ManualClock::new(start());
        let store = Arc::new(MemoryLockStore::new());
        let coordinator = LockCoordinator::new(store.clone()).with_clock(Arc::new(clock.clone()));
        (coordinator, clock, store)
    }

    fn alice() -> Owner {
        Owner::new("1", "alice")
    }

    fn bob() -> Owner {
        Owner::new("2", "bob")
    }

    #[tokio::test]
    async fn test_acquire_fresh_sets_expiry() -> Result<()> {
        let (coordinator, _, _) = setup();
        let outcome = coordinator.acquire(ResourceId::new(7), &alice()).await?;

        match outcome {
            AcquireOutcome::Granted { lock, kind } => {
                assert_eq!(kind, GrantKind::Fresh);
                assert_eq!(lock.acquired_at, start());
                assert_eq!(lock.expires_at, start() + Duration::minutes(5));
            }
            AcquireOutcome::Denied { .. } => panic!("expected grant"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_reacquire_by_owner_refreshes_both_timestamps() -> Result<()> {
        let (coordinator, clock, _) = setup();
        coordinator.acquire(ResourceId::new(7), &alice()).await?;

        clock.advance(Duration::minutes(4));
        let outcome = coordinator.acquire(ResourceId::new(7), &alice()).await?;

        let now = start() + Duration::minutes(4);
        match outcome {
            AcquireOutcome::Granted { lock, kind } => {
                assert_eq!(kind, GrantKind::Extended);
                assert_eq!(lock.acquired_at, now);
                assert_eq!(lock.expires_at, now + Duration::minutes(5));
            }
            AcquireOutcome::Denied { .. } => panic!("owner must be able to extend"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_denied_keeps_original_expiry() -> Result<()> {
        let (coordinator, clock, _) = setup();
        coordinator.acquire(ResourceId::new(7), &alice()).await?;

        clock.advance(Duration::minutes(1));
        let outcome = coordinator.acquire(ResourceId::new(7), &bob()).await?;

        match outcome {
            AcquireOutcome::Denied { holder } => {
                assert_eq!(holder.owner, alice());
                assert_eq!(holder.expires_at, start() + Duration::minutes(5));
            }
            AcquireOutcome::Granted { .. } => panic!("bob must be denied"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_lock_transfers_ownership() -> Result<()> {
        let (coordinator, clock, _) = setup();
        coordinator.acquire(ResourceId::new(7), &alice()).await?;

        clock.advance(Duration::minutes(5));
        let outcome = coordinator.acquire(ResourceId::new(7), &bob()).await?;

        assert!(matches!(
            &outcome,
            AcquireOutcome::Granted {
                kind: GrantKind::Fresh,
                ..
            }
        ));
        assert_eq!(outcome.lock().owner, bob());
        Ok(())
    }

    #[tokio::test]
    async fn test_release_expired_lock_by_anyone() -> Result<()> {
        let (coordinator, clock, store) = setup();
        coordinator.acquire(ResourceId::new(7), &alice()).await?;

        clock.advance(Duration::minutes(6));
        assert!(coordinator.release(ResourceId::new(7), &bob().id).await?);
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_release_without_lock_is_false() -> Result<()> {
        let (coordinator, _, _) = setup();
        assert!(!coordinator.release(ResourceId::new(7), &alice().id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_inspect_deletes_expired_lock() -> Result<()> {
        let (coordinator, clock, store) = setup();
        coordinator.acquire(ResourceId::new(7), &alice()).await?;
        assert!(coordinator.inspect(ResourceId::new(7)).await?.is_some());

        clock.advance(Duration::minutes(5));
        assert_eq!(coordinator.inspect(ResourceId::new(7)).await?, None);
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_leaves_live_locks() -> Result<()> {
        let (coordinator, clock, store) = setup();
        coordinator.acquire(ResourceId::new(1), &alice()).await?;
        clock.advance(Duration::minutes(3));
        coordinator.acquire(ResourceId::new(2), &bob()).await?;
        clock.advance(Duration::minutes(2));

        let swept = coordinator.sweep_expired(coordinator.now()).await?;
        assert_eq!(swept, 1);
        assert_eq!(store.len().await, 1);
        assert!(coordinator.inspect(ResourceId::new(2)).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_expired_is_zero() -> Result<()> {
        let (coordinator, _, store) = setup();
        coordinator.acquire(ResourceId::new(1), &alice()).await?;

        assert_eq!(coordinator.sweep_expired(coordinator.now()).await?, 0);
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_active_locks_excludes_expired() -> Result<()> {
        let (coordinator, clock, _) = setup();
        coordinator.acquire(ResourceId::new(1), &alice()).await?;
        clock.advance(Duration::minutes(4));
        coordinator.acquire(ResourceId::new(2), &bob()).await?;
        clock.advance(Duration::minutes(1));

        let active = coordinator.active_locks().await?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].resource_id, ResourceId::new(2));
        Ok(())
    }

    #[test]
    fn test_from_config_rejects_zero_timeout() {
        let config = LockConfig {
            lock_timeout_secs: 0,
            ..LockConfig::default()
        };
        let result = LockCoordinator::from_config(Arc::new(MemoryLockStore::new()), &config);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_with_timeout_rejects_zero_and_negative() {
        let coordinator = LockCoordinator::new(Arc::new(MemoryLockStore::new()));
        for timeout in [Duration::zero(), Duration::seconds(-5)] {
            assert!(matches!(
                coordinator.clone().with_timeout(timeout),
                Err(Error::InvalidConfig(_))
            ));
        }
        assert_eq!(coordinator.timeout(), Duration::seconds(DEFAULT_TIMEOUT_SECS));
    }

    #[tokio::test]
    async fn test_custom_timeout_sets_expiry() -> Result<()> {
        let (coordinator, _, _) = setup();
        let coordinator = coordinator.with_timeout(Duration::seconds(30))?;

        let outcome = coordinator.acquire(ResourceId::new(7), &alice()).await?;
        assert_eq!(outcome.lock().expires_at, start() + Duration::seconds(30));
        Ok(())
    }

    #[test]
    fn test_now_truncates_to_millis() {
        let clock = Arc::new(ManualClock::new(start()));
        let coordinator =
            LockCoordinator::new(Arc::new(MemoryLockStore::new())).with_clock(clock);
        assert_eq!(coordinator.now().timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
