//! Editlock - edit-lock coordinator CLI
//!
//! Drives [`editlock_core`] against a `SQLite` lock store and runs the
//! background expiry sweeper.

pub mod cli;
pub mod commands;
pub mod context;

pub use context::AppContext;

/// Exit code when the lock is held by someone else or nothing was released.
pub const EXIT_CONTENDED: i32 = 3;
