//! `SQLite` lock store.
//!
//! One row per locked resource in `edit_locks`, keyed by `resource_id`.
//! Timestamps are stored as Unix milliseconds so expiry comparisons are
//! plain integer comparisons inside SQL.

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use super::LockStore;
use crate::{
    lock::{AcquireOutcome, Lock, Owner, OwnerId, ResourceId},
    Error, Result,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 8;

type LockRow = (i64, String, String, i64, i64);

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: i64, column: &str) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::CorruptRecord(format!("{column} out of range: {millis}")))
}

fn row_to_lock(
    (resource_id, owner_id, owner_name, acquired_at, expires_at): LockRow,
) -> Result<Lock> {
    Ok(Lock {
        resource_id: ResourceId::new(resource_id),
        owner: Owner::new(owner_id, owner_name),
        acquired_at: from_millis(acquired_at, "acquired_at")?,
        expires_at: from_millis(expires_at, "expires_at")?,
    })
}

/// Lock store backed by `SQLite`.
#[derive(Debug, Clone)]
pub struct SqliteLockStore {
    db: SqlitePool,
}

impl SqliteLockStore {
    #[must_use]
    pub const fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open (creating if needed) a database file with WAL journaling.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Io(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let db = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::StoreUnavailable(format!("Failed to open {}: {e}", path.display()))
            })?;

        Ok(Self::new(db))
    }

    /// Private in-memory database. A single pooled connection that never
    /// idles out, since each `:memory:` connection is its own database.
    pub async fn open_in_memory() -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(Self::new(db))
    }

    /// Get the database pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Count stored rows for one resource, expired ones included.
    pub async fn row_count(&self, resource_id: ResourceId) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM edit_locks WHERE resource_id = ?")
                .bind(resource_id.value())
                .fetch_one(&self.db)
                .await
                .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl LockStore for SqliteLockStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS edit_locks (
                resource_id INTEGER PRIMARY KEY,
                owner_id TEXT NOT NULL,
                owner_name TEXT NOT NULL,
                acquired_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL CHECK (expires_at > acquired_at)
            )",
        )
        .execute(&self.db)
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_edit_locks_expires_at ON edit_locks (expires_at)",
        )
        .execute(&self.db)
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    async fn try_acquire(&self, candidate: &Lock, now: DateTime<Utc>) -> Result<AcquireOutcome> {
        let resource_id = candidate.resource_id.value();
        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        // Opening with a write takes the database write lock before the row
        // is read, so no other acquire or release can interleave.
        sqlx::query("DELETE FROM edit_locks WHERE resource_id = ? AND expires_at <= ?")
            .bind(resource_id)
            .bind(to_millis(now))
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        let current: Option<LockRow> = sqlx::query_as(
            "SELECT resource_id, owner_id, owner_name, acquired_at, expires_at
             FROM edit_locks WHERE resource_id = ?",
        )
        .bind(resource_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        let current = current.map(row_to_lock).transpose()?;
        let outcome = AcquireOutcome::decide(current, candidate.clone(), now);

        if let AcquireOutcome::Granted { lock, .. } = &outcome {
            sqlx::query(
                "INSERT INTO edit_locks (resource_id, owner_id, owner_name, acquired_at, expires_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(resource_id) DO UPDATE SET
                    owner_id = excluded.owner_id,
                    owner_name = excluded.owner_name,
                    acquired_at = excluded.acquired_at,
                    expires_at = excluded.expires_at",
            )
            .bind(resource_id)
            .bind(lock.owner.id.as_str())
            .bind(&lock.owner.name)
            .bind(to_millis(lock.acquired_at))
            .bind(to_millis(lock.expires_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        Ok(outcome)
    }

    async fn delete_if_releasable(
        &self,
        resource_id: ResourceId,
        owner_id: &OwnerId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM edit_locks WHERE resource_id = ? AND (owner_id = ? OR expires_at <= ?)",
        )
        .bind(resource_id.value())
        .bind(owner_id.as_str())
        .bind(to_millis(now))
        .execute(&self.db)
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_if_expired(
        &self,
        resource_id: ResourceId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM edit_locks WHERE resource_id = ? AND expires_at <= ?")
            .bind(resource_id.value())
            .bind(to_millis(now))
            .execute(&self.db)
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, resource_id: ResourceId) -> Result<Option<Lock>> {
        let row: Option<LockRow> = sqlx::query_as(
            "SELECT resource_id, owner_id, owner_name, acquired_at, expires_at
             FROM edit_locks WHERE resource_id = ?",
        )
        .bind(resource_id.value())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        row.map(row_to_lock).transpose()
    }

    async fn delete_all_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM edit_locks WHERE expires_at <= ?")
            .bind(to_millis(now))
            .execute(&self.db)
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn list_live(&self, now: DateTime<Utc>) -> Result<Vec<Lock>> {
        let rows: Vec<LockRow> = sqlx::query_as(
            "SELECT resource_id, owner_id, owner_name, acquired_at, expires_at
             FROM edit_locks WHERE expires_at > ? ORDER BY resource_id",
        )
        .bind(to_millis(now))
        .fetch_all(&self.db)
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        rows.into_iter().map(row_to_lock).collect()
    }
}
