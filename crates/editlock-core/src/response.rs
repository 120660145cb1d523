//! Request-facing lock representation.
//!
//! Success and "held by someone else" are told apart by [`LockStatus`], never
//! by an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::lock::{AcquireOutcome, GrantKind, Lock, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    /// The caller now holds a new lock.
    Acquired,
    /// The caller already held the lock and it was extended.
    Extended,
    /// Someone else holds the lock.
    Denied,
    /// Reported by inspection: the resource is currently locked.
    Held,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockResponse {
    pub resource_id: ResourceId,
    pub status: LockStatus,
    pub locked_by_user_id: String,
    pub locked_by_user_name: String,
    pub lock_acquired_at: DateTime<Utc>,
    pub lock_expires_at: DateTime<Utc>,
    /// Whether the lock was still valid when this response was built.
    pub is_active: bool,
    pub message: String,
}

impl LockResponse {
    fn from_lock(lock: &Lock, status: LockStatus, message: String, now: DateTime<Utc>) -> Self {
        Self {
            resource_id: lock.resource_id,
            status,
            locked_by_user_id: lock.owner.id.to_string(),
            locked_by_user_name: lock.owner.name.clone(),
            lock_acquired_at: lock.acquired_at,
            lock_expires_at: lock.expires_at,
            is_active: now < lock.expires_at,
            message,
        }
    }

    /// Shape an acquire outcome.
    #[must_use]
    pub fn from_outcome(outcome: &AcquireOutcome, now: DateTime<Utc>) -> Self {
        match outcome {
            AcquireOutcome::Granted {
                lock,
                kind: GrantKind::Fresh,
            } => Self::from_lock(
                lock,
                LockStatus::Acquired,
                "Lock acquired successfully.".to_string(),
                now,
            ),
            AcquireOutcome::Granted {
                lock,
                kind: GrantKind::Extended,
            } => Self::from_lock(
                lock,
                LockStatus::Extended,
                "Lock extended successfully.".to_string(),
                now,
            ),
            AcquireOutcome::Denied { holder } => Self::from_lock(
                holder,
                LockStatus::Denied,
                format!(
                    "Invoice is locked by {} until {} UTC.",
                    holder.owner.name,
                    holder.expires_at.format("%Y-%m-%d %H:%M:%S")
                ),
                now,
            ),
        }
    }

    /// Shape a lock found by inspection.
    #[must_use]
    pub fn held(lock: &Lock, now: DateTime<Utc>) -> Self {
        Self::from_lock(
            lock,
            LockStatus::Held,
            "Invoice is currently locked.".to_string(),
            now,
        )
    }

    /// True when the caller holds the lock after this response.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self.status, LockStatus::Acquired | LockStatus::Extended)
    }
}
