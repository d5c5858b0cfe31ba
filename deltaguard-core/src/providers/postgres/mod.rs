//! PostgreSQL and Redshift provider.
//!
//! Redshift speaks the PostgreSQL wire protocol, so both backends share this
//! session type and differ only in their [`SqlDialect`] and defaults.
//!
//! # Module Structure
//! - `connection`: Pool creation with per-flavor defaults
//! - `reading`: Header discovery via `information_schema` and typed decoding
//! - `writing`: Transactional create/insert for `write_table`
//!
//! # Naming
//! Table names resolve to `"schema"."table"`. A dotted name (`mart.orders`)
//! overrides the configured schema, which defaults to `public`.

mod connection;
mod reading;
mod writing;


use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    Result,
    error::DeltaGuardError,
    models::{BackendKind, Recordset, WriteMode},
    providers::{Provider, config::SqlServerConfig, sql::SqlDialect},
};

/// Schema used when none is configured
pub const DEFAULT_SCHEMA: &str = "public";
pub const POSTGRES_PORT: u16 = 5432;
pub const REDSHIFT_PORT: u16 = 5439;
/// Database used by Redshift when none is configured
pub const REDSHIFT_DATABASE: &str = "dev";

const PROBE_TABLE: &str = "__perm_test";

/// Provider for a PostgreSQL or Redshift database.
pub struct PostgresProvider {
    config: SqlServerConfig,
    dialect: SqlDialect,
    pool: Option<PgPool>,
}

impl std::fmt::Debug for PostgresProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresProvider")
            .field("config", &self.config.to_string())
            .field("dialect", &self.dialect)
            .field("connected", &self.pool.is_some())
            .finish()
    }
}

impl PostgresProvider {
    /// Creates an unconnected PostgreSQL provider.
    pub fn postgres(config: SqlServerConfig) -> Self {
        Self {
            config,
            dialect: SqlDialect::Postgres,
            pool: None,
        }
    }

    /// Creates an unconnected Redshift provider.
    pub fn redshift(config: SqlServerConfig) -> Self {
        Self {
            config,
            dialect: SqlDialect::Redshift,
            pool: None,
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Splits a table name into schema and table.
    pub fn resolve<'a>(&'a self, name: &'a str) -> (&'a str, &'a str) {
        match name.split_once('.') {
            Some((schema, table)) if !schema.is_empty() && !table.is_empty() => (schema, table),
            _ => (self.default_schema(), name),
        }
    }

    /// Database this provider connects to
    pub fn database(&self) -> &str {
        match self.dialect {
            SqlDialect::Redshift => self.config.database_or(REDSHIFT_DATABASE),
            _ => &self.config.database,
        }
    }

    fn port(&self) -> u16 {
        match self.dialect {
            SqlDialect::Redshift => self.config.port_or(REDSHIFT_PORT),
            _ => self.config.port_or(POSTGRES_PORT),
        }
    }

    fn default_schema(&self) -> &str {
        self.config
            .schema
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SCHEMA)
    }

    /// Quoted, schema-qualified reference for a table name
    pub fn table_ref(&self, name: &str) -> String {
        let (schema, table) = self.resolve(name);
        self.dialect.qualify(&[schema, table])
    }

    async fn pool(&mut self) -> Result<&PgPool> {
        if self.pool.is_none() {
            let pool =
                connection::open_pool(&self.config, self.dialect, self.database(), self.port())
                    .await?;
            self.pool = Some(pool);
        }
        self.pool.as_ref().ok_or_else(|| {
            DeltaGuardError::configuration("postgres: pool unavailable after connect")
        })
    }
}

#[async_trait]
impl Provider for PostgresProvider {
    fn backend(&self) -> BackendKind {
        match self.dialect {
            SqlDialect::Redshift => BackendKind::Redshift,
            _ => BackendKind::Postgres,
        }
    }

    async fn connect(&mut self) -> Result<()> {
        self.pool().await.map(|_| ())
    }

    async fn ping(&mut self) -> Result<()> {
        let backend = self.backend();
        let pool = self.pool().await?;
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(pool)
            .await
            .map_err(|e| DeltaGuardError::connection_failed(format!("{} ping failed", backend), e))?;
        Ok(())
    }

    async fn probe_read(&mut self) -> Result<()> {
        let pool = self.pool().await?;
        sqlx::query("SELECT table_name FROM information_schema.tables LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(|e| DeltaGuardError::read_failed("Cannot read information_schema", e))?;
        Ok(())
    }

    async fn probe_write(&mut self) -> Result<()> {
        let table = self.table_ref(PROBE_TABLE);
        let dialect = self.dialect;
        let pool = self.pool().await?;

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| DeltaGuardError::write_failed("Cannot begin probe transaction", e))?;
        sqlx::query(&format!("CREATE TABLE {table} (id INTEGER)"))
            .execute(&mut *tx)
            .await
            .map_err(|e| DeltaGuardError::write_failed("Cannot create probe table", e))?;
        sqlx::query(&dialect.drop_table(&table))
            .execute(&mut *tx)
            .await
            .map_err(|e| DeltaGuardError::write_failed("Cannot drop probe table", e))?;
        tx.commit()
            .await
            .map_err(|e| DeltaGuardError::write_failed("Cannot commit probe transaction", e))
    }

    async fn list_datasets(&mut self) -> Result<Vec<String>> {
        Ok(vec![self.database().to_string()])
    }

    async fn list_tables(&mut self, dataset: Option<&str>) -> Result<Vec<String>> {
        let schema = dataset
            .filter(|d| !d.is_empty())
            .unwrap_or(self.default_schema())
            .to_string();
        let pool = self.pool().await?;
        sqlx::query_scalar::<_, String>(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name",
        )
        .bind(&schema)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            DeltaGuardError::read_failed(format!("Failed to list tables in schema '{}'", schema), e)
        })
    }

    async fn read_table(&mut self, name: &str, limit: Option<usize>) -> Result<Recordset> {
        let (schema, table) = self.resolve(name);
        let (schema, table) = (schema.to_string(), table.to_string());
        let dialect = self.dialect;
        let pool = self.pool().await?;
        reading::read_table(pool, dialect, &schema, &table, limit).await
    }

    async fn write_table(
        &mut self,
        name: &str,
        data: &Recordset,
        mode: WriteMode,
    ) -> Result<u64> {
        let (schema, table) = self.resolve(name);
        let (schema, table) = (schema.to_string(), table.to_string());
        let dialect = self.dialect;
        let pool = self.pool().await?;
        writing::write_table(pool, dialect, &schema, &table, data, mode).await
    }

    async fn delete_rows(&mut self, name: &str, predicate: Option<&str>) -> Result<u64> {
        let statement = self.dialect.delete(&self.table_ref(name), predicate);
        let pool = self.pool().await?;
        let result = sqlx::query(&statement).execute(pool).await.map_err(|e| {
            DeltaGuardError::write_failed(format!("Failed to delete rows from '{}'", name), e)
        })?;
        Ok(result.rows_affected())
    }

    async fn delete_table(&mut self, name: &str) -> Result<()> {
        let statement = self.dialect.drop_table(&self.table_ref(name));
        let pool = self.pool().await?;
        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(|e| DeltaGuardError::write_failed(format!("Failed to drop '{}'", name), e))?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            tracing::debug!(backend = %self.backend(), "Connection pool closed");
        }
    }
}
