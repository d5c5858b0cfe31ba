//! MySQL provider.
//!
//! # Module Structure
//! - `connection`: Pool creation
//! - `reading`: Header discovery via `information_schema` and typed decoding
//! - `writing`: Transactional create/insert for `write_table`
//!
//! # Naming
//! Tables resolve to `` `database`.`table` ``; a dotted name selects another
//! database. MySQL has no separate schema level.
//!
//! DDL commits implicitly in MySQL, so `write_table` in `Replace` mode is
//! not atomic with respect to the inserts that follow.

mod connection;
mod reading;
mod writing;


use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::{
    Result,
    error::DeltaGuardError,
    models::{BackendKind, Recordset, WriteMode},
    providers::{Provider, config::SqlServerConfig, sql::SqlDialect},
};

pub const MYSQL_PORT: u16 = 3306;

const PROBE_TABLE: &str = "__perm_test";
const DIALECT: SqlDialect = SqlDialect::MySql;

/// Provider for one MySQL database.
pub struct MySqlProvider {
    config: SqlServerConfig,
    pool: Option<MySqlPool>,
}

impl std::fmt::Debug for MySqlProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlProvider")
            .field("config", &self.config.to_string())
            .field("connected", &self.pool.is_some())
            .finish()
    }
}

impl MySqlProvider {
    pub fn new(config: SqlServerConfig) -> Self {
        Self { config, pool: None }
    }

    /// Splits a table name into database and table.
    pub fn resolve<'a>(&'a self, name: &'a str) -> (&'a str, &'a str) {
        match name.split_once('.') {
            Some((database, table)) if !database.is_empty() && !table.is_empty() => {
                (database, table)
            }
            _ => (self.config.database.as_str(), name),
        }
    }

    pub fn table_ref(&self, name: &str) -> String {
        let (database, table) = self.resolve(name);
        DIALECT.qualify(&[database, table])
    }

    async fn pool(&mut self) -> Result<&MySqlPool> {
        if self.pool.is_none() {
            self.pool = Some(connection::open_pool(&self.config).await?);
        }
        self.pool
            .as_ref()
            .ok_or_else(|| DeltaGuardError::configuration("mysql: pool unavailable after connect"))
    }
}

#[async_trait]
impl Provider for MySqlProvider {
    fn backend(&self) -> BackendKind {
        BackendKind::MySql
    }

    async fn connect(&mut self) -> Result<()> {
        self.pool().await.map(|_| ())
    }

    async fn ping(&mut self) -> Result<()> {
        let pool = self.pool().await?;
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(pool)
            .await
            .map_err(|e| DeltaGuardError::connection_failed("MySQL ping failed", e))?;
        Ok(())
    }

    async fn probe_read(&mut self) -> Result<()> {
        let database = self.config.database.clone();
        let pool = self.pool().await?;
        sqlx::query("SELECT 1 FROM information_schema.tables WHERE table_schema = ? LIMIT 1")
            .bind(&database)
            .fetch_optional(pool)
            .await
            .map_err(|e| DeltaGuardError::read_failed("Cannot read information_schema", e))?;
        Ok(())
    }

    async fn probe_write(&mut self) -> Result<()> {
        let table = self.table_ref(PROBE_TABLE);
        let pool = self.pool().await?;
        sqlx::query(&format!("CREATE TABLE IF NOT EXISTS {table} (id INTEGER)"))
            .execute(pool)
            .await
            .map_err(|e| DeltaGuardError::write_failed("Cannot create probe table", e))?;
        sqlx::query(&DIALECT.drop_table(&table))
            .execute(pool)
            .await
            .map_err(|e| DeltaGuardError::write_failed("Cannot drop probe table", e))?;
        Ok(())
    }

    async fn list_datasets(&mut self) -> Result<Vec<String>> {
        Ok(vec![self.config.database.clone()])
    }

    async fn list_tables(&mut self, dataset: Option<&str>) -> Result<Vec<String>> {
        let database = dataset
            .filter(|d| !d.is_empty())
            .unwrap_or(self.config.database.as_str())
            .to_string();
        let pool = self.pool().await?;
        sqlx::query_scalar::<_, String>(
            "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
             WHERE table_schema = ? AND table_type = 'BASE TABLE' ORDER BY table_name",
        )
        .bind(&database)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            DeltaGuardError::read_failed(format!("Failed to list tables in '{}'", database), e)
        })
    }

    async fn read_table(&mut self, name: &str, limit: Option<usize>) -> Result<Recordset> {
        let (database, table) = self.resolve(name);
        let (database, table) = (database.to_string(), table.to_string());
        let pool = self.pool().await?;
        reading::read_table(pool, &database, &table, limit).await
    }

    async fn write_table(
        &mut self,
        name: &str,
        data: &Recordset,
        mode: WriteMode,
    ) -> Result<u64> {
        let target = self.table_ref(name);
        let pool = self.pool().await?;
        writing::write_table(pool, &target, data, mode).await
    }

    async fn delete_rows(&mut self, name: &str, predicate: Option<&str>) -> Result<u64> {
        let statement = DIALECT.delete(&self.table_ref(name), predicate);
        let pool = self.pool().await?;
        let result = sqlx::query(&statement).execute(pool).await.map_err(|e| {
            DeltaGuardError::write_failed(format!("Failed to delete rows from '{}'", name), e)
        })?;
        Ok(result.rows_affected())
    }

    async fn delete_table(&mut self, name: &str) -> Result<()> {
        let statement = DIALECT.drop_table(&self.table_ref(name));
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
            tracing::debug!("MySQL connection pool closed");
        }
    }
}
