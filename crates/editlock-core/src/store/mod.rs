//! Lock Store - persistence boundary for lock state.
//!
//! The store holds at most one lock per [`ResourceId`]. Every method that
//! decides and then writes does so atomically for that key; the
//! coordinator never performs a separate read followed by a write.
//!
//! Implementations:
//! - [`SqliteLockStore`] - durable, shared by every coordinator process that
//!   opens the same database
//! - [`MemoryLockStore`] - in-process, for tests and embedding

use chrono::{DateTime, Utc};

use crate::{
    lock::{AcquireOutcome, Lock, OwnerId, ResourceId},
    Result,
};

mod memory;
mod sqlite;

pub use memory::MemoryLockStore;
pub use sqlite::SqliteLockStore;

/// Trait defining the persistence boundary for edit locks.
///
/// Any error means the store could not be consulted. Callers must treat
/// that as a failure and never as a grant.
#[async_trait::async_trait]
pub trait LockStore: Send + Sync {
    /// Create backing storage if it does not exist. Idempotent.
    async fn init(&self) -> Result<()>;

    /// Read the stored lock for `candidate.resource_id`, decide with
    /// [`AcquireOutcome::decide`], and persist `candidate` when granted.
    ///
    /// The read, decision and write form one indivisible step with respect
    /// to every other operation on the same key.
    async fn try_acquire(&self, candidate: &Lock, now: DateTime<Utc>) -> Result<AcquireOutcome>;

    /// Delete the lock if it is held by `owner_id` or expired at `now`.
    ///
    /// Returns whether a row was removed.
    async fn delete_if_releasable(
        &self,
        resource_id: ResourceId,
        owner_id: &OwnerId,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Delete the lock only if it is still expired at `now`.
    async fn delete_if_expired(&self, resource_id: ResourceId, now: DateTime<Utc>)
        -> Result<bool>;

    /// Raw read, expired or not.
    async fn get(&self, resource_id: ResourceId) -> Result<Option<Lock>>;

    /// Delete every lock with `expires_at <= now`. Returns the number removed.
    async fn delete_all_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Locks with `expires_at > now`, ordered by resource id.
    async fn list_live(&self, now: DateTime<Utc>) -> Result<Vec<Lock>>;
}
