//! End-to-end edit-lock scenarios over the `SQLite` store.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use editlock_core::{
    AcquireOutcome, EditDecision, EditLockService, Error, ExpirySweeper, Lock, LockCoordinator,
    LockStatus, LockStore, ManualClock, Owner, OwnerId, ResourceId, SqliteLockStore,
    SqliteResourceCatalog, StaticResourceCatalog,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 22, 6, 58, 22)
        .single()
        .unwrap_or_default()
}

async fn sqlite_coordinator(
    clock: &ManualClock,
) -> Result<(LockCoordinator, Arc<SqliteLockStore>), Error> {
    let store = Arc::new(SqliteLockStore::open_in_memory().await?);
    store.init().await?;
    let coordinator = LockCoordinator::new(store.clone()).with_clock(Arc::new(clock.clone()));
    Ok((coordinator, store))
}

#[tokio::test]
async fn test_invoice_seven_walkthrough() -> Result<(), Error> {
    let clock = ManualClock::new(start());
    let (coordinator, store) = sqlite_coordinator(&clock).await?;
    let alice = Owner::new("1", "alice");
    let bob = Owner::new("2", "bob");
    let invoice = ResourceId::new(7);

    // Alice opens the invoice.
    let first = coordinator.acquire(invoice, &alice).await?;
    assert!(first.is_granted());
    assert_eq!(first.lock().expires_at, start() + Duration::minutes(5));

    // Bob is told who holds it and until when.
    clock.advance(Duration::minutes(2));
    let denied = coordinator.acquire(invoice, &bob).await?;
    assert_eq!(
        denied,
        AcquireOutcome::Denied {
            holder: first.lock().clone()
        }
    );

    // Bob cannot release Alice's live lock.
    assert!(!coordinator.release(invoice, &bob.id).await?);

    // Alice keeps working and extends.
    clock.advance(Duration::minutes(2));
    let extended = coordinator.acquire(invoice, &alice).await?;
    assert!(extended.is_granted());
    assert_eq!(extended.lock().expires_at, start() + Duration::minutes(9));
    assert_eq!(store.row_count(invoice).await?, 1);

    // Alice walks away; the lock lapses and Bob takes over.
    clock.advance(Duration::minutes(5));
    let taken = coordinator.acquire(invoice, &bob).await?;
    assert!(taken.is_granted());
    assert_eq!(taken.lock().owner, bob);

    assert!(coordinator.release(invoice, &bob.id).await?);
    assert_eq!(coordinator.inspect(invoice).await?, None);
    Ok(())
}

#[tokio::test]
async fn test_service_edit_flow_with_invoice_table() -> Result<(), Error> {
    let clock = ManualClock::new(start());
    let (coordinator, store) = sqlite_coordinator(&clock).await?;
    sqlx::query("CREATE TABLE invoices (id INTEGER PRIMARY KEY, total INTEGER NOT NULL)")
        .execute(store.pool())
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    sqlx::query("INSERT INTO invoices (id, total) VALUES (7, 100)")
        .execute(store.pool())
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

    let catalog = SqliteResourceCatalog::new(store.pool().clone(), "invoices")?;
    let service = EditLockService::new(coordinator, Arc::new(catalog));
    let alice = Owner::new("1", "alice");
    let bob = Owner::new("2", "bob");
    let invoice = ResourceId::new(7);

    assert!(matches!(
        service.acquire(ResourceId::new(8), &alice).await,
        Err(Error::NotFound(id)) if id == ResourceId::new(8)
    ));

    let granted = service.acquire(invoice, &alice).await?;
    assert_eq!(granted.status, LockStatus::Acquired);

    match service.authorize_edit(invoice, &bob).await? {
        EditDecision::Conflict(response) => {
            assert_eq!(response.locked_by_user_name, "alice");
            assert!(response.is_active);
        }
        EditDecision::Proceed => return Err(Error::Io("bob should be refused".into())),
    }

    assert_eq!(service.authorize_edit(invoice, &alice).await?, EditDecision::Proceed);
    service.complete_edit(invoice, &alice).await?;

    assert_eq!(service.authorize_edit(invoice, &bob).await?, EditDecision::Proceed);
    assert_eq!(store.row_count(invoice).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_sweep_pass_over_sqlite() -> Result<(), Error> {
    let clock = ManualClock::new(start());
    let (coordinator, store) = sqlite_coordinator(&clock).await?;

    let owners: Vec<Owner> = (1..=5)
        .map(|n| Owner::new(format!("{n}"), format!("user {n}")))
        .collect();
    let acquires = owners
        .iter()
        .zip(1_i64..)
        .map(|(owner, id)| coordinator.acquire(ResourceId::new(id), owner));
    for outcome in futures::future::join_all(acquires).await {
        assert!(outcome?.is_granted());
    }

    clock.advance(Duration::minutes(3));
    coordinator.acquire(ResourceId::new(1), &owners[0]).await?;
    clock.advance(Duration::minutes(2));

    let report = ExpirySweeper::new(coordinator.clone(), std::time::Duration::from_secs(60))?
        .run_once()
        .await?;
    assert_eq!(report.swept, 4);
    assert_eq!(store.row_count(ResourceId::new(1)).await?, 1);

    let again = ExpirySweeper::new(coordinator, std::time::Duration::from_secs(60))?
        .run_once()
        .await?;
    assert_eq!(again.swept, 0);
    Ok(())
}

/// Store that is always down.
struct UnavailableStore;

#[async_trait::async_trait]
impl LockStore for UnavailableStore {
    async fn init(&self) -> editlock_core::Result<()> {
        Err(down())
    }

    async fn try_acquire(
        &self,
        _: &Lock,
        _: DateTime<Utc>,
    ) -> editlock_core::Result<AcquireOutcome> {
        Err(down())
    }

    async fn delete_if_releasable(
        &self,
        _: ResourceId,
        _: &OwnerId,
        _: DateTime<Utc>,
    ) -> editlock_core::Result<bool> {
        Err(down())
    }

    async fn delete_if_expired(
        &self,
        _: ResourceId,
        _: DateTime<Utc>,
    ) -> editlock_core::Result<bool> {
        Err(down())
    }

    async fn get(&self, _: ResourceId) -> editlock_core::Result<Option<Lock>> {
        Err(down())
    }

    async fn delete_all_expired(&self, _: DateTime<Utc>) -> editlock_core::Result<u64> {
        Err(down())
    }

    async fn list_live(&self, _: DateTime<Utc>) -> editlock_core::Result<Vec<Lock>> {
        Err(down())
    }
}

fn down() -> Error {
    Error::StoreUnavailable("connection refused".into())
}

#[tokio::test]
async fn test_store_failure_fails_closed() {
    let coordinator = LockCoordinator::new(Arc::new(UnavailableStore));
    let service = EditLockService::new(
        coordinator.clone(),
        Arc::new(StaticResourceCatalog::new([ResourceId::new(7)])),
    );
    let alice = Owner::new("1", "alice");
    let invoice = ResourceId::new(7);

    assert_eq!(coordinator.acquire(invoice, &alice).await, Err(down()));
    assert_eq!(coordinator.release(invoice, &alice.id).await, Err(down()));
    assert_eq!(coordinator.inspect(invoice).await, Err(down()));
    assert_eq!(coordinator.sweep_expired(start()).await, Err(down()));

    // An edit is never authorized when lock state cannot be read.
    assert_eq!(service.authorize_edit(invoice, &alice).await, Err(down()));
    assert_eq!(down().code(), "STORE_UNAVAILABLE");
}
