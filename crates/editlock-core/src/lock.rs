//! Lock domain types
//!
//! A [`Lock`] is a time-bounded claim of exclusive edit rights over one
//! resource. A lock whose `expires_at` is not in the future is logically
//! absent, whether or not it is still stored.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Identifier of a lockable resource (an invoice id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(i64);

impl ResourceId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a lock owner (the requesting principal).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a lock holder: opaque id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub name: String,
}

impl Owner {
    pub fn new(id: impl Into<OwnerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// An exclusive edit lock on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// The locked resource.
    pub resource_id: ResourceId,
    /// The current holder.
    pub owner: Owner,
    /// When the holder obtained or last extended the lock.
    pub acquired_at: DateTime<Utc>,
    /// When the lock stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Lock {
    /// Create a lock held by `owner` from `now` until `now + ttl`.
    #[must_use]
    pub fn new(resource_id: ResourceId, owner: Owner, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            resource_id,
            owner,
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    /// A lock is expired once `expires_at <= now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    #[must_use]
    pub fn is_held_by(&self, owner_id: &OwnerId) -> bool {
        &self.owner.id == owner_id
    }

    /// Whether `owner_id` may take over or remove this lock at `now`.
    ///
    /// True when the lock already belongs to `owner_id` or has expired.
    /// Both re-acquire and release use this rule.
    #[must_use]
    pub fn yields_to(&self, owner_id: &OwnerId, now: DateTime<Utc>) -> bool {
        self.is_held_by(owner_id) || self.is_expired_at(now)
    }
}

/// How a granted lock came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    /// No live lock existed; a new one was created (or an expired one replaced).
    Fresh,
    /// The requester already held the lock; its expiry was pushed out.
    Extended,
}

/// Result of an acquire attempt.
///
/// `Denied` is a normal outcome, carrying the current holder so the caller
/// can report who holds the lock and until when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Granted { lock: Lock, kind: GrantKind },
    Denied { holder: Lock },
}

impl AcquireOutcome {
    /// Decide an acquire of `candidate` given the lock currently stored.
    ///
    /// Stores call this inside their per-key critical section and persist
    /// `candidate` only when the result is `Granted`.
    #[must_use]
    pub fn decide(current: Option<Lock>, candidate: Lock, now: DateTime<Utc>) -> Self {
        match current {
            Some(existing) if !existing.is_expired_at(now) => {
                if existing.is_held_by(&candidate.owner.id) {
                    Self::Granted {
                        lock: candidate,
                        kind: GrantKind::Extended,
                    }
                } else {
                    Self::Denied { holder: existing }
                }
            }
            _ => Self::Granted {
                lock: candidate,
                kind: GrantKind::Fresh,
            },
        }
    }

    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    /// The lock the outcome refers to: the new lock when granted, the
    /// current holder's lock when denied.
    #[must_use]
    pub const fn lock(&self) -> &Lock {
        match self {
            Self::Granted { lock, .. } => lock,
            Self::Denied { holder } => holder,
        }
    }
}
