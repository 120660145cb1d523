//! Per-invocation application context: configuration plus an opened store.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use clap::ArgMatches;
use editlock_core::{
    config::{load_config, Config},
    EditLockService, LockCoordinator, LockStore, SqliteLockStore, SqliteResourceCatalog,
};

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteLockStore>,
    pub service: EditLockService,
}

impl AppContext {
    /// Resolve configuration from the global `--config` / `--db` flags.
    pub fn resolve_config(matches: &ArgMatches) -> Result<Config> {
        let explicit = matches.get_one::<String>("config").map(Path::new);
        let mut config = load_config(explicit).context("Failed to load configuration")?;

        if let Some(db) = matches.get_one::<String>("db") {
            config.store.db_path.clone_from(db);
            config.validate().context("Invalid --db value")?;
        }

        Ok(config)
    }

    /// Open the lock database, creating the lock table if needed.
    pub async fn open(config: Config) -> Result<Self> {
        let db_path = Path::new(&config.store.db_path);
        let store = Arc::new(
            SqliteLockStore::open(db_path)
                .await
                .with_context(|| format!("Failed to open lock store {}", db_path.display()))?,
        );
        store
            .init()
            .await
            .context("Failed to initialize lock table")?;

        let coordinator = LockCoordinator::from_config(store.clone(), &config.lock)?;
        let catalog =
            SqliteResourceCatalog::new(store.pool().clone(), config.store.resource_table.clone())?;
        let service = EditLockService::new(coordinator, Arc::new(catalog));

        tracing::debug!(db_path = %config.store.db_path, "Opened lock store");

        Ok(Self {
            config,
            store,
            service,
        })
    }

    #[must_use]
    pub const fn coordinator(&self) -> &LockCoordinator {
        self.service.coordinator()
    }

    /// Close the connection pool, flushing the WAL.
    pub async fn close(self) {
        self.store.pool().close().await;
    }
}
