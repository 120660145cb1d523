//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: ~/.config/editlock/config.toml
//! 3. Project config: .editlock/config.toml
//! 4. Explicit config file (`--config`)
//! 5. Environment variables: `EDITLOCK_*`
//! 6. CLI flags (command-specific, applied by the binary)
//!
//! Files may set any subset of keys; unset keys keep the value from the
//! previous layer.
//!
//! # Example Config
//!
//! ```toml
//! [lock]
//! lock_timeout_secs = 300
//! sweep_interval_secs = 60
//!
//! [store]
//! db_path = ".editlock/locks.db"
//! resource_table = "invoices"
//! ```

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound for the timeout and the sweep interval (one day).
const MAX_SECS: u64 = 86_400;

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub lock: LockConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockConfig {
    /// How long a lock stays valid after it is acquired or extended.
    pub lock_timeout_secs: u64,
    /// How often the expiry sweeper runs.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// `SQLite` database holding the `edit_locks` table.
    pub db_path: String,
    /// Table whose integer `id` column lists lockable resources.
    pub resource_table: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: ".editlock/locks.db".to_string(),
            resource_table: "invoices".to_string(),
        }
    }
}

impl LockConfig {
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// A config file as written: every key optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(default)]
    pub lock: PartialLockConfig,
    #[serde(default)]
    pub store: PartialStoreConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialLockConfig {
    pub lock_timeout_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialStoreConfig {
    pub db_path: Option<String>,
    pub resource_table: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════════════════════════

/// Load configuration from all sources with hierarchy.
///
/// `explicit` is an additional file applied after the project config; it
/// must exist when given.
pub fn load_config(explicit: Option<&std::path::Path>) -> Result<Config> {
    let config = Config::default();

    let config = match global_config_path() {
        Some(path) if path.is_file() => config.merge(load_toml_file(&path)?),
        _ => config,
    };

    let project_path = project_config_path()?;
    let config = if project_path.is_file() {
        config.merge(load_toml_file(&project_path)?)
    } else {
        config
    };

    let config = match explicit {
        Some(path) => config.merge(load_toml_file(path)?),
        None => config,
    };

    let config = config.apply_env_vars()?;
    config.validate()?;
    Ok(config)
}

/// Get path to global config file
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "editlock")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Get path to project config file
pub fn project_config_path() -> Result<PathBuf> {
    std::env::current_dir()
        .map(|dir| dir.join(".editlock/config.toml"))
        .map_err(|e| Error::Io(format!("Failed to get current directory: {e}")))
}

/// Load a TOML file into a partial config
pub fn load_toml_file(path: &std::path::Path) -> Result<PartialConfig> {
    if path.is_dir() {
        return Err(Error::Io(format!(
            "Config path is a directory, not a file: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("Failed to read config file {}: {e}", path.display())))?;

    toml::from_str(&content).map_err(|e| {
        Error::InvalidConfig(format!(
            "Failed to parse config file {}: {e}",
            path.display()
        ))
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// MERGE / ENV / VALIDATION
// ═══════════════════════════════════════════════════════════════════════════

impl Config {
    /// Overlay the keys set in `other`.
    #[must_use]
    pub fn merge(self, other: PartialConfig) -> Self {
        Self {
            lock: LockConfig {
                lock_timeout_secs: other
                    .lock
                    .lock_timeout_secs
                    .unwrap_or(self.lock.lock_timeout_secs),
                sweep_interval_secs: other
                    .lock
                    .sweep_interval_secs
                    .unwrap_or(self.lock.sweep_interval_secs),
            },
            store: StoreConfig {
                db_path: other.store.db_path.unwrap_or(self.store.db_path),
                resource_table: other
                    .store
                    .resource_table
                    .unwrap_or(self.store.resource_table),
            },
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_vars(mut self) -> Result<Self> {
        // EDITLOCK_LOCK_TIMEOUT_SECS
        if let Ok(value) = std::env::var("EDITLOCK_LOCK_TIMEOUT_SECS") {
            self.lock.lock_timeout_secs = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid EDITLOCK_LOCK_TIMEOUT_SECS value: {e}"))
            })?;
        }

        // EDITLOCK_SWEEP_INTERVAL_SECS
        if let Ok(value) = std::env::var("EDITLOCK_SWEEP_INTERVAL_SECS") {
            self.lock.sweep_interval_secs = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid EDITLOCK_SWEEP_INTERVAL_SECS value: {e}"))
            })?;
        }

        // EDITLOCK_DB_PATH
        if let Ok(value) = std::env::var("EDITLOCK_DB_PATH") {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "EDITLOCK_DB_PATH cannot be empty - unset the variable or provide a path"
                        .into(),
                ));
            }
            self.store.db_path = value;
        }

        // EDITLOCK_RESOURCE_TABLE
        if let Ok(value) = std::env::var("EDITLOCK_RESOURCE_TABLE") {
            self.store.resource_table = value;
        }

        Ok(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SECS).contains(&self.lock.lock_timeout_secs) {
            return Err(Error::InvalidConfig(format!(
                "lock_timeout_secs must be 1-{MAX_SECS}, got {}",
                self.lock.lock_timeout_secs
            )));
        }

        if !(1..=MAX_SECS).contains(&self.lock.sweep_interval_secs) {
            return Err(Error::InvalidConfig(format!(
                "sweep_interval_secs must be 1-{MAX_SECS}, got {}",
                self.lock.sweep_interval_secs
            )));
        }

        if self.store.db_path.trim().is_empty() {
            return Err(Error::InvalidConfig("db_path cannot be empty".into()));
        }

        if !is_sql_identifier(&self.store.resource_table) {
            return Err(Error::InvalidConfig(format!(
                "resource_table must be a plain identifier, got '{}'",
                self.store.resource_table
            )));
        }

        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
