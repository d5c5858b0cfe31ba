//! Snowflake provider over the SQL API (v2).
//!
//! Statements are POSTed to `/api/v2/statements`. Long-running statements
//! answer with a handle that is polled until the result is ready; large
//! results are split into partitions fetched one by one.
//!
//! Tables are created with `STRING` columns and rows are inserted with
//! positional text bindings.

pub mod api;
pub mod auth;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use self::api::{Binding, StatementRequest, StatementResponse};
use self::auth::Credential;
use crate::{
    Result,
    error::DeltaGuardError,
    models::{BackendKind, Recordset, WriteMode},
    providers::{
        Provider,
        config::SnowflakeConfig,
        helpers::{rows_per_statement, value_to_text},
        http::{self, HttpError, send_json},
        sql::SqlDialect,
    },
};

const DIALECT: SqlDialect = SqlDialect::Snowflake;
const PROBE_TABLE: &str = "PERM_TEST";
const STATEMENTS_PATH: &str = "/api/v2/statements";
/// Bindings per INSERT statement
const MAX_BINDINGS: usize = 16_384;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Provider for one Snowflake database.
pub struct SnowflakeProvider {
    config: SnowflakeConfig,
    client: Client,
    base_url: String,
    credential: Option<Credential>,
}

impl std::fmt::Debug for SnowflakeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeProvider")
            .field("config", &self.config.to_string())
            .field("base_url", &self.base_url)
            .field("connected", &self.credential.is_some())
            .finish()
    }
}

impl SnowflakeProvider {
    /// Creates an unconnected provider.
    pub fn new(config: SnowflakeConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.statement_timeout_secs)
            .max(http::DEFAULT_TIMEOUT)
            + Duration::from_secs(10);
        Ok(Self {
            base_url: config.base_url(),
            client: http::create_http_client(timeout)?,
            config,
            credential: None,
        })
    }

    /// Quoted identifier of a table name. Dotted names qualify the schema
    /// (and database) explicitly.
    pub fn table_ref(name: &str) -> String {
        let parts: Vec<&str> = name.split('.').collect();
        DIALECT.qualify(&parts)
    }

    fn authorize(&mut self, request: RequestBuilder) -> Result<RequestBuilder> {
        if self.credential.is_none() {
            self.credential = Some(Credential::from_config(&self.config)?);
        }
        let credential = self
            .credential
            .as_mut()
            .ok_or_else(|| DeltaGuardError::configuration("snowflake: credential unavailable"))?;
        let token = credential.bearer()?;
        Ok(request
            .bearer_auth(token.expose())
            .header("X-Snowflake-Authorization-Token-Type", credential.token_type())
            .header(reqwest::header::ACCEPT, "application/json")
            .header(
                reqwest::header::USER_AGENT,
                concat!("deltaguard/", env!("CARGO_PKG_VERSION")),
            ))
    }

    /// Executes one statement and returns every page of its result.
    async fn execute(
        &mut self,
        statement: &str,
        bindings: BTreeMap<String, Binding>,
    ) -> Result<(StatementResponse, Vec<Vec<Option<String>>>)> {
        tracing::debug!(statement, bindings = bindings.len(), "Executing Snowflake statement");
        let body = StatementRequest {
            statement,
            timeout: self.config.statement_timeout_secs,
            database: &self.config.database,
            schema: self.config.schema.as_deref(),
            warehouse: self.config.warehouse.as_deref(),
            role: self.config.role.as_deref(),
            bindings,
        };
        let url = format!("{}{}", self.base_url, STATEMENTS_PATH);
        let request = self.authorize(self.client.post(url).json(&body))?;
        let mut response: StatementResponse = send_json(request)
            .await
            .map_err(|e| statement_error(statement, e))?;

        let deadline = tokio::time::Instant::now()
            + Duration::from_secs(self.config.statement_timeout_secs);
        while response.is_running() {
            if tokio::time::Instant::now() > deadline {
                return Err(DeltaGuardError::query_failed(
                    format!("Snowflake statement did not finish: {}", statement),
                    "timed out",
                ));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            let handle = statement_handle(&response)?;
            let request = self.authorize(self.client.get(self.status_url(&handle)))?;
            response = send_json(request)
                .await
                .map_err(|e| statement_error(statement, e))?;
        }

        let mut data = std::mem::take(&mut response.data);
        let partitions = response
            .result_set_meta_data
            .as_ref()
            .map_or(0, |meta| meta.partition_info.len());
        if partitions > 1 {
            let handle = statement_handle(&response)?;
            for partition in 1..partitions {
                let request = self.authorize(
                    self.client
                        .get(self.status_url(&handle))
                        .query(&[("partition", partition)]),
                )?;
                let page: StatementResponse = send_json(request)
                    .await
                    .map_err(|e| statement_error(statement, e))?;
                data.extend(page.data);
            }
        }
        Ok((response, data))
    }

    fn status_url(&self, handle: &str) -> String {
        format!("{}{}/{}", self.base_url, STATEMENTS_PATH, handle)
    }

    async fn run(&mut self, statement: &str) -> Result<StatementResponse> {
        self.execute(statement, BTreeMap::new())
            .await
            .map(|(response, _)| response)
    }

    async fn insert_rows(&mut self, target: &str, data: &Recordset) -> Result<()> {
        let prefix = DIALECT.insert_prefix(target, data.columns());
        let placeholders = format!("({})", vec!["?"; data.width()].join(", "));
        let batch = rows_per_statement(MAX_BINDINGS, data.width());

        for range in data.chunk_ranges(batch) {
            let rows = &data.rows()[range.clone()];
            let statement = format!(
                "{}VALUES {}",
                prefix,
                vec![placeholders.as_str(); rows.len()].join(", ")
            );
            let bindings = rows
                .iter()
                .flatten()
                .enumerate()
                .map(|(i, value)| {
                    let text = (!value.is_null()).then(|| value_to_text(value));
                    ((i + 1).to_string(), Binding::text(text))
                })
                .collect();
            self.execute(&statement, bindings).await.map_err(|e| {
                DeltaGuardError::write_failed(
                    format!("Insert into {} failed at rows {}..{}", target, range.start, range.end),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

fn statement_handle(response: &StatementResponse) -> Result<String> {
    response.statement_handle.clone().ok_or_else(|| {
        DeltaGuardError::query_failed(
            "Snowflake response has no statement handle",
            response.message.clone().unwrap_or_default(),
        )
    })
}

fn statement_error(statement: &str, error: HttpError) -> DeltaGuardError {
    let context = format!("Snowflake statement failed: {}", statement);
    match error.status().map(|s| s.as_u16()) {
        Some(401 | 403) => DeltaGuardError::connection_failed(context, error),
        Some(_) => DeltaGuardError::query_failed(context, error),
        None => DeltaGuardError::connection_failed(context, error),
    }
}

/// Re-labels a statement failure as a failure of `target`
fn as_read(target: &str) -> impl FnOnce(DeltaGuardError) -> DeltaGuardError + '_ {
    move |e| match e {
        DeltaGuardError::Query { source, .. } => {
            DeltaGuardError::read_failed(format!("Failed to read {}", target), source)
        }
        other => other,
    }
}

fn as_write(target: &str) -> impl FnOnce(DeltaGuardError) -> DeltaGuardError + '_ {
    move |e| match e {
        DeltaGuardError::Query { source, .. } => {
            DeltaGuardError::write_failed(format!("Failed to write {}", target), source)
        }
        other => other,
    }
}

#[async_trait]
impl Provider for SnowflakeProvider {
    fn backend(&self) -> BackendKind {
        BackendKind::Snowflake
    }

    async fn connect(&mut self) -> Result<()> {
        if self.credential.is_some() {
            return Ok(());
        }
        self.config.validate()?;
        if let Err(e) = self.run("SELECT 1").await {
            self.credential = None;
            return Err(e);
        }
        tracing::debug!(account = %self.config.account, "Snowflake session established");
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        self.run("SELECT 1").await.map(|_| ())
    }

    async fn probe_read(&mut self) -> Result<()> {
        self.run("SELECT 1").await.map(|_| ())
    }

    async fn probe_write(&mut self) -> Result<()> {
        let table = DIALECT.quote(PROBE_TABLE);
        self.run(&format!("CREATE TEMPORARY TABLE {} (c STRING)", table))
            .await?;
        self.run(&DIALECT.drop_table(&table)).await.map(|_| ())
    }

    async fn list_datasets(&mut self) -> Result<Vec<String>> {
        self.connect().await?;
        Ok(vec![self.config.database.clone()])
    }

    async fn list_tables(&mut self, dataset: Option<&str>) -> Result<Vec<String>> {
        self.connect().await?;
        let statement = match dataset.or(self.config.schema.as_deref()) {
            Some(schema) => format!(
                "SHOW TABLES IN SCHEMA {}",
                DIALECT.qualify(&[self.config.database.as_str(), schema])
            ),
            None => "SHOW TABLES".to_string(),
        };
        let (response, data) = self.execute(&statement, BTreeMap::new()).await?;
        let name_index = response
            .result_set_meta_data
            .as_ref()
            .and_then(|meta| meta.row_type.iter().position(|r| r.name.eq_ignore_ascii_case("name")))
            .unwrap_or(1);
        Ok(data
            .into_iter()
            .filter_map(|row| row.into_iter().nth(name_index).flatten())
            .collect())
    }

    async fn read_table(&mut self, name: &str, limit: Option<usize>) -> Result<Recordset> {
        self.connect().await?;
        let target = Self::table_ref(name);
        let statement = DIALECT.select(&target, "*", limit);
        let (response, data) = self
            .execute(&statement, BTreeMap::new())
            .await
            .map_err(as_read(&target))?;

        let meta = response.result_set_meta_data.unwrap_or_default();
        let columns = api::columns_of(&meta);
        let rows = data
            .iter()
            .map(|row| {
                meta.row_type
                    .iter()
                    .enumerate()
                    .map(|(i, row_type)| {
                        api::cell_value(row.get(i).and_then(|cell| cell.as_deref()), row_type)
                    })
                    .collect::<Vec<Value>>()
            })
            .collect();
        Recordset::new(columns, rows)
    }

    async fn write_table(
        &mut self,
        name: &str,
        data: &Recordset,
        mode: WriteMode,
    ) -> Result<u64> {
        if data.width() == 0 {
            tracing::warn!(table = name, "Recordset has no columns; nothing written");
            return Ok(0);
        }
        self.connect().await?;
        let target = Self::table_ref(name);

        if mode == WriteMode::Replace {
            self.run(&DIALECT.drop_table(&target))
                .await
                .map_err(as_write(&target))?;
        }
        self.run(&DIALECT.create_table(&target, data.columns(), true))
            .await
            .map_err(as_write(&target))?;
        self.insert_rows(&target, data).await?;

        tracing::info!(table = %target, rows = data.len(), %mode, "Snowflake table written");
        Ok(data.len() as u64)
    }

    async fn delete_rows(&mut self, name: &str, predicate: Option<&str>) -> Result<u64> {
        self.connect().await?;
        let target = Self::table_ref(name);
        let (response, data) = self
            .execute(&DIALECT.delete(&target, predicate), BTreeMap::new())
            .await
            .map_err(as_write(&target))?;
        // The count is reported in stats, or as the single result cell
        let from_stats = response.stats.map(|s| s.num_rows_deleted);
        let from_data = data
            .first()
            .and_then(|row| row.first())
            .and_then(|cell| cell.as_deref())
            .and_then(|n| n.parse().ok());
        Ok(from_stats.filter(|&n| n > 0).or(from_data).unwrap_or(0))
    }

    async fn delete_table(&mut self, name: &str) -> Result<()> {
        self.connect().await?;
        let target = Self::table_ref(name);
        self.run(&DIALECT.drop_table(&target))
            .await
            .map(|_| ())
            .map_err(as_write(&target))
    }

    async fn close(&mut self) {
        if self.credential.take().is_some() {
            tracing::debug!("Snowflake session closed");
        }
    }
}
