//! Edit-lock service: the boundary used by record-editing code.
//!
//! Wraps a [`LockCoordinator`] with a resource existence check and the
//! before-edit / after-edit contract:
//!
//! - before writing resource R for principal P, [`EditLockService::authorize_edit`]
//!   refuses when someone other than P holds a live lock on R
//! - after a successful write, [`EditLockService::complete_edit`] releases P's
//!   lock; a lock that is already gone is not an error

use std::{collections::HashSet, sync::Arc};

use sqlx::SqlitePool;

use crate::{
    config::is_sql_identifier,
    coordinator::LockCoordinator,
    lock::{Owner, ResourceId},
    response::LockResponse,
    Error, Result,
};

/// Answers whether a resource exists in the owning domain.
#[async_trait::async_trait]
pub trait ResourceCatalog: Send + Sync {
    async fn exists(&self, resource_id: ResourceId) -> Result<bool>;
}

/// Fixed set of known resource ids.
#[derive(Debug, Clone, Default)]
pub struct StaticResourceCatalog {
    ids: HashSet<ResourceId>,
}

impl StaticResourceCatalog {
    pub fn new(ids: impl IntoIterator<Item = ResourceId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

#[async_trait::async_trait]
impl ResourceCatalog for StaticResourceCatalog {
    async fn exists(&self, resource_id: ResourceId) -> Result<bool> {
        Ok(self.ids.contains(&resource_id))
    }
}

/// Looks resources up by integer `id` in a `SQLite` table.
#[derive(Debug, Clone)]
pub struct SqliteResourceCatalog {
    db: SqlitePool,
    table: String,
}

impl SqliteResourceCatalog {
    pub fn new(db: SqlitePool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_sql_identifier(&table) {
            return Err(Error::InvalidConfig(format!(
                "Invalid resource table name: '{table}'"
            )));
        }
        Ok(Self { db, table })
    }
}

#[async_trait::async_trait]
impl ResourceCatalog for SqliteResourceCatalog {
    async fn exists(&self, resource_id: ResourceId) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ? LIMIT 1", self.table);
        match sqlx::query(&sql)
            .bind(resource_id.value())
            .fetch_optional(&self.db)
            .await
        {
            Ok(row) => Ok(row.is_some()),
            Err(e) => {
                // Databases without the resource table accept every id.
                let message = e.to_string();
                if message.contains("no such table") {
                    tracing::debug!(
                        table = %self.table,
                        "Resource table missing; skipping existence check"
                    );
                    Ok(true)
                } else {
                    Err(Error::StoreUnavailable(format!(
                        "Failed to query {}: {e}",
                        self.table
                    )))
                }
            }
        }
    }
}

/// Whether an edit may go ahead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditDecision {
    /// No live lock, or the editor holds it.
    Proceed,
    /// Another owner holds a live lock.
    Conflict(LockResponse),
}

/// Lock operations as seen by the record-editing service.
#[derive(Clone)]
pub struct EditLockService {
    coordinator: LockCoordinator,
    catalog: Arc<dyn ResourceCatalog>,
}

impl EditLockService {
    #[must_use]
    pub fn new(coordinator: LockCoordinator, catalog: Arc<dyn ResourceCatalog>) -> Self {
        Self {
            coordinator,
            catalog,
        }
    }

    #[must_use]
    pub const fn coordinator(&self) -> &LockCoordinator {
        &self.coordinator
    }

    /// Acquire (or extend) the edit lock for `principal`.
    ///
    /// Fails with [`Error::NotFound`] when the resource does not exist.
    /// Contention comes back as a response with status `denied`.
    pub async fn acquire(
        &self,
        resource_id: ResourceId,
        principal: &Owner,
    ) -> Result<LockResponse> {
        if !self.catalog.exists(resource_id).await? {
            return Err(Error::NotFound(resource_id));
        }

        let outcome = self.coordinator.acquire(resource_id, principal).await?;
        Ok(LockResponse::from_outcome(&outcome, self.coordinator.now()))
    }

    pub async fn release(&self, resource_id: ResourceId, principal: &Owner) -> Result<bool> {
        self.coordinator.release(resource_id, &principal.id).await
    }

    /// Current lock on the resource, shaped for display.
    pub async fn status(&self, resource_id: ResourceId) -> Result<Option<LockResponse>> {
        let lock = self.coordinator.inspect(resource_id).await?;
        let now = self.coordinator.now();
        Ok(lock.map(|lock| LockResponse::held(&lock, now)))
    }

    /// Check whether `principal` may write `resource_id` now.
    pub async fn authorize_edit(
        &self,
        resource_id: ResourceId,
        principal: &Owner,
    ) -> Result<EditDecision> {
        match self.coordinator.inspect(resource_id).await? {
            Some(lock) if !lock.is_held_by(&principal.id) => {
                tracing::warn!(
                    resource_id = %resource_id,
                    owner_id = %principal.id,
                    holder_id = %lock.owner.id,
                    "Edit refused: resource locked by another owner"
                );
                Ok(EditDecision::Conflict(LockResponse::held(
                    &lock,
                    self.coordinator.now(),
                )))
            }
            _ => Ok(EditDecision::Proceed),
        }
    }

    /// Release `principal`'s lock after a successful edit.
    pub async fn complete_edit(&self, resource_id: ResourceId, principal: &Owner) -> Result<()> {
        if !self.coordinator.release(resource_id, &principal.id).await? {
            tracing::debug!(resource_id = %resource_id, "No lock to release after edit");
        }
        Ok(())
    }

    /// List every live lock, shaped for display.
    pub async fn active_locks(&self) -> Result<Vec<LockResponse>> {
        let now = self.coordinator.now();
        Ok(self
            .coordinator
            .active_locks()
            .await?
            .iter()
            .map(|lock| LockResponse::held(lock, now))
            .collect())
    }
}
