//! SQLite pool creation.
//!
//! File databases are created on first connect, along with any missing
//! parent directories. `:memory:` opens a private in-memory database that
//! lives as long as the pool's single connection.

use std::time::Duration;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{Result, error::DeltaGuardError, providers::config::SqliteConfig};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens a single-connection pool for the configured database.
pub(super) async fn open_pool(config: &SqliteConfig) -> Result<SqlitePool> {
    config.validate()?;

    let options = if config.is_in_memory() {
        SqliteConnectOptions::new().in_memory(true)
    } else {
        ensure_parent_dir(config)?;
        SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
    };

    // idle/lifetime reaping would discard an in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| {
            DeltaGuardError::connection_failed(
                format!("Failed to open SQLite database {}", config.path.display()),
                e,
            )
        })?;

    tracing::debug!(path = %config.path.display(), "SQLite database opened");
    Ok(pool)
}

fn ensure_parent_dir(config: &SqliteConfig) -> Result<()> {
    match config.path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|e| {
                DeltaGuardError::io(
                    format!("Failed to create directory {}", parent.display()),
                    e,
                )
            })
        }
        _ => Ok(()),
    }
}
