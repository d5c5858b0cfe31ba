//! SQLite provider over an embedded database file.
//!
//! # Module Structure
//! - `connection`: Pool creation for file-based and in-memory databases
//! - `reading`: Header discovery via `pragma_table_info` and row decoding
//! - `writing`: Transactional create/insert for `write_table`
//!
//! # SQLite-Specific Behavior
//! - Bare table names, double-quoted
//! - A single pooled connection, so `:memory:` databases persist for the
//!   provider's lifetime
//! - The only dataset is `main`

mod connection;
mod reading;
mod writing;


use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::{
    Result,
    error::DeltaGuardError,
    models::{BackendKind, Recordset, WriteMode},
    providers::{Provider, config::SqliteConfig, sql::SqlDialect},
};

/// Table created and dropped by the write probe
const PROBE_TABLE: &str = "__perm_test";

/// Provider for a single SQLite database.
pub struct SqliteProvider {
    config: SqliteConfig,
    pool: Option<SqlitePool>,
}

impl std::fmt::Debug for SqliteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProvider")
            .field("config", &self.config)
            .field("connected", &self.pool.is_some())
            .finish()
    }
}

impl SqliteProvider {
    /// Creates an unconnected provider.
    pub fn new(config: SqliteConfig) -> Self {
        Self { config, pool: None }
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    async fn pool(&mut self) -> Result<&SqlitePool> {
        if self.pool.is_none() {
            self.pool = Some(connection::open_pool(&self.config).await?);
        }
        self.pool
            .as_ref()
            .ok_or_else(|| DeltaGuardError::configuration("sqlite: pool unavailable after connect"))
    }

    fn table_ref(name: &str) -> String {
        SqlDialect::Sqlite.quote(name)
    }
}

#[async_trait]
impl Provider for SqliteProvider {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn connect(&mut self) -> Result<()> {
        self.pool().await.map(|_| ())
    }

    async fn ping(&mut self) -> Result<()> {
        let pool = self.pool().await?;
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(pool)
            .await
            .map_err(|e| DeltaGuardError::connection_failed("SQLite ping failed", e))?;
        Ok(())
    }

    async fn probe_read(&mut self) -> Result<()> {
        let pool = self.pool().await?;
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sqlite_master")
            .fetch_one(pool)
            .await
            .map_err(|e| DeltaGuardError::read_failed("Cannot read sqlite_master", e))?;
        Ok(())
    }

    async fn probe_write(&mut self) -> Result<()> {
        let pool = self.pool().await?;
        let table = Self::table_ref(PROBE_TABLE);
        // Dropping the transaction without commit rolls back a half-done probe
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| DeltaGuardError::write_failed("Cannot begin probe transaction", e))?;
        sqlx::query(&format!("CREATE TABLE IF NOT EXISTS {table} (id INTEGER)"))
            .execute(&mut *tx)
            .await
            .map_err(|e| DeltaGuardError::write_failed("Cannot create probe table", e))?;
        sqlx::query(&SqlDialect::Sqlite.drop_table(&table))
            .execute(&mut *tx)
            .await
            .map_err(|e| DeltaGuardError::write_failed("Cannot drop probe table", e))?;
        tx.commit()
            .await
            .map_err(|e| DeltaGuardError::write_failed("Cannot commit probe transaction", e))
    }

    async fn list_datasets(&mut self) -> Result<Vec<String>> {
        Ok(vec!["main".to_string()])
    }

    async fn list_tables(&mut self, _dataset: Option<&str>) -> Result<Vec<String>> {
        let pool = self.pool().await?;
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .map_err(|e| DeltaGuardError::read_failed("Failed to list SQLite tables", e))
    }

    async fn read_table(&mut self, name: &str, limit: Option<usize>) -> Result<Recordset> {
        let pool = self.pool().await?;
        reading::read_table(pool, name, limit).await
    }

    async fn write_table(
        &mut self,
        name: &str,
        data: &Recordset,
        mode: WriteMode,
    ) -> Result<u64> {
        let pool = self.pool().await?;
        writing::write_table(pool, name, data, mode).await
    }

    async fn delete_rows(&mut self, name: &str, predicate: Option<&str>) -> Result<u64> {
        let pool = self.pool().await?;
        let statement = SqlDialect::Sqlite.delete(&Self::table_ref(name), predicate);
        let result = sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(|e| {
                DeltaGuardError::write_failed(format!("Failed to delete rows from '{}'", name), e)
            })?;
        Ok(result.rows_affected())
    }

    async fn delete_table(&mut self, name: &str) -> Result<()> {
        let pool = self.pool().await?;
        sqlx::query(&SqlDialect::Sqlite.drop_table(&Self::table_ref(name)))
            .execute(pool)
            .await
            .map_err(|e| DeltaGuardError::write_failed(format!("Failed to drop '{}'", name), e))?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            tracing::debug!(path = %self.config.path.display(), "SQLite pool closed");
        }
    }
}
