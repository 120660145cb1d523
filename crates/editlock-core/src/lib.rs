//! # Editlock Core
//!
//! Edit-lock coordination for collaboratively edited records.
//!
//! A [`LockCoordinator`] grants, extends, releases, inspects and expires
//! time-bounded exclusive locks on records identified by [`ResourceId`].
//! Lock state lives in a [`LockStore`]; the store guarantees per-key atomic
//! read-modify-write so two concurrent acquires can never both win.
//! An [`ExpirySweeper`] purges expired locks in the background, and
//! [`EditLockService`] is the boundary used by the record-editing code.
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` - returns `Result` instead
//! - No `expect()` - returns `Result` instead
//! - No `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only
//!
//! ## Error Handling
//!
//! All fallible operations return `Result<T, Error>`. Contention is not an
//! error: a refused acquire is [`AcquireOutcome::Denied`] and a refused
//! release is `Ok(false)`.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod coordinator;
mod error;
pub mod lock;
pub mod response;
pub mod service;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use coordinator::LockCoordinator;
pub use error::{Error, Result};
pub use lock::{AcquireOutcome, GrantKind, Lock, Owner, OwnerId, ResourceId};
pub use response::{LockResponse, LockStatus};
pub use service::{
    EditDecision, EditLockService, ResourceCatalog, SqliteResourceCatalog, StaticResourceCatalog,
};
pub use store::{LockStore, MemoryLockStore, SqliteLockStore};
pub use sweeper::{ExpirySweeper, SweepReport, SweeperHandle};
