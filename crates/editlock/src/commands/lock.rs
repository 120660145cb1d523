//! Lock commands: acquire, release, inspect, list.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use anyhow::{Context, Result};
use editlock_core::{Owner, OwnerId, ResourceId};
use serde_json::json;

use super::print_json;
use crate::{AppContext, EXIT_CONTENDED};

/// Acquire or extend. Exits with [`EXIT_CONTENDED`] when someone else holds
/// the lock.
pub async fn acquire(ctx: &AppContext, resource_id: ResourceId, owner: &Owner) -> Result<i32> {
    let response = ctx
        .service
        .acquire(resource_id, owner)
        .await
        .with_context(|| format!("Failed to acquire lock on resource {resource_id}"))?;

    print_json(&response)?;
    Ok(if response.is_granted() {
        0
    } else {
        EXIT_CONTENDED
    })
}

pub async fn release(ctx: &AppContext, resource_id: ResourceId, owner_id: &OwnerId) -> Result<i32> {
    let released = ctx
        .coordinator()
        .release(resource_id, owner_id)
        .await
        .with_context(|| format!("Failed to release lock on resource {resource_id}"))?;

    print_json(&json!({ "released": released }))?;
    Ok(if released { 0 } else { EXIT_CONTENDED })
}

pub async fn inspect(ctx: &AppContext, resource_id: ResourceId) -> Result<i32> {
    let status = ctx
        .service
        .status(resource_id)
        .await
        .with_context(|| format!("Failed to inspect resource {resource_id}"))?;

    match status {
        Some(response) => print_json(&response)?,
        None => print_json(&json!({ "locked": false }))?,
    }
    Ok(0)
}

pub async fn list(ctx: &AppContext) -> Result<i32> {
    let locks = ctx
        .service
        .active_locks()
        .await
        .context("Failed to list locks")?;

    print_json(&locks)?;
    Ok(0)
}
