//! Google BigQuery provider over the REST API.
//!
//! # Module Structure
//! - `api`: Request and response wire types
//! - `auth`: Service-account JWT exchange and token caching
//! - `values`: Cell conversion and load-job payloads
//!
//! # Naming
//! Table names may be `table` (default dataset), `dataset.table` or
//! `project.dataset.table`.
//!
//! # Writes
//! Missing tables are created from the recordset's inferred schema. Rows
//! are then uploaded as newline-delimited JSON in a single multipart load
//! job with `WRITE_APPEND` / `CREATE_NEVER`, polled until done, so appends
//! follow the existing table's column types. `Replace` deletes the table
//! first.

pub mod api;
pub mod auth;
pub mod values;

#[cfg(test)]
mod tests;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use self::api::{
    DatasetList, Job, QueryRequest, QueryResponse, TableList, TableReference, TableResource,
};
use self::auth::{ServiceAccountKey, TokenSource};
use crate::{
    Result,
    error::DeltaGuardError,
    models::{BackendKind, Recordset, WriteMode},
    providers::{
        Provider,
        config::BigQueryConfig,
        http::{self, HttpError, send_json, send_unit},
        sql::SqlDialect,
    },
};

const PROBE_TABLE: &str = "__perm_test";
const QUERY_TIMEOUT_MS: u64 = 30_000;
const JOB_POLL_INTERVAL: Duration = Duration::from_millis(500);
const MAX_JOB_POLLS: usize = 1_200;
const MULTIPART_BOUNDARY: &str = "deltaguard_load_boundary";

struct Session {
    project: String,
    tokens: TokenSource,
}

/// Provider for one BigQuery project.
pub struct BigQueryProvider {
    config: BigQueryConfig,
    client: Client,
    api_root: String,
    session: Option<Session>,
}

impl std::fmt::Debug for BigQueryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryProvider")
            .field("config", &self.config.to_string())
            .field("api_root", &self.api_root)
            .field("connected", &self.session.is_some())
            .finish()
    }
}

impl BigQueryProvider {
    /// Creates an unconnected provider.
    ///
    /// # Errors
    /// Returns `Configuration` if the HTTP client cannot be built
    pub fn new(config: BigQueryConfig) -> Result<Self> {
        let api_root = config
            .api_base_url
            .as_deref()
            .unwrap_or(api::DEFAULT_API_ROOT)
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            config,
            client: http::create_http_client(http::DEFAULT_TIMEOUT)?,
            api_root,
            session: None,
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}/bigquery/v2{}", self.api_root, path)
    }

    fn upload(&self, path: &str) -> String {
        format!("{}/upload/bigquery/v2{}", self.api_root, path)
    }

    /// Creates the session on first use and returns the project and a token.
    async fn authorize(&mut self) -> Result<(String, String)> {
        if self.session.is_none() {
            self.session = Some(self.open_session()?);
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| DeltaGuardError::configuration("bigquery: session unavailable"))?;
        let token = session.tokens.token(&self.client).await?;
        Ok((session.project.clone(), token.expose().to_string()))
    }

    fn open_session(&self) -> Result<Session> {
        let key = match self.config.resolved_keyfile() {
            Some(path) if self.config.access_token.is_none() => {
                Some(ServiceAccountKey::from_file(&path)?)
            }
            _ => None,
        };

        let project = self
            .config
            .project_id
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| key.as_ref().and_then(|k| k.project_id.clone()))
            .ok_or_else(|| {
                DeltaGuardError::configuration("bigquery: project_id could not be determined")
            })?;

        let tokens = match (&self.config.access_token, key) {
            (Some(token), _) => TokenSource::Static(token.clone()),
            (None, Some(key)) => TokenSource::service_account(key),
            (None, None) => {
                return Err(DeltaGuardError::configuration(
                    "bigquery: no access token or service-account key configured",
                ));
            }
        };

        Ok(Session { project, tokens })
    }

    /// Resolves `table`, `dataset.table` or `project.dataset.table`.
    pub fn table_reference(&self, project: &str, name: &str) -> Result<TableReference> {
        let parts: Vec<&str> = name.split('.').collect();
        let (project_id, dataset_id, table_id) = match parts.as_slice() {
            [table] => {
                let dataset = self
                    .config
                    .dataset
                    .as_deref()
                    .filter(|d| !d.is_empty())
                    .ok_or_else(|| {
                        DeltaGuardError::configuration(format!(
                            "bigquery: '{}' has no dataset and no default dataset is configured",
                            name
                        ))
                    })?;
                (project, dataset, *table)
            }
            [dataset, table] => (project, *dataset, *table),
            [project, dataset, table] => (*project, *dataset, *table),
            _ => {
                return Err(DeltaGuardError::configuration(format!(
                    "bigquery: invalid table name '{}'",
                    name
                )));
            }
        };
        if [project_id, dataset_id, table_id].iter().any(|p| p.is_empty()) {
            return Err(DeltaGuardError::configuration(format!(
                "bigquery: invalid table name '{}'",
                name
            )));
        }
        Ok(TableReference {
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        })
    }

    /// Runs a query to completion and collects every result page.
    async fn run_query(&mut self, sql: &str) -> Result<Vec<QueryResponse>> {
        let (project, token) = self.authorize().await?;
        tracing::debug!(query = sql, "Running BigQuery query");

        let request = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            location: self.config.location.as_deref(),
            timeout_ms: QUERY_TIMEOUT_MS,
        };
        let url = self.api(&format!("/projects/{}/queries", project));
        let mut response: QueryResponse =
            send_json(self.client.post(url).bearer_auth(&token).json(&request))
                .await
                .map_err(|e| query_error(sql, e))?;

        let mut pages = Vec::new();
        let mut polls = 0;
        loop {
            let page_token = response.page_token.clone();
            let job = response.job_reference.clone();
            let complete = response.job_complete;
            if complete {
                pages.push(response);
            }
            if complete && page_token.is_none() {
                break;
            }

            let job = job.ok_or_else(|| {
                DeltaGuardError::read_failed(
                    "BigQuery returned an incomplete result without a job reference",
                    "missing jobReference",
                )
            })?;
            if !complete {
                polls += 1;
                if polls > MAX_JOB_POLLS {
                    return Err(DeltaGuardError::read_failed(
                        format!("BigQuery job {} did not finish", job.job_id),
                        "timed out",
                    ));
                }
                tokio::time::sleep(JOB_POLL_INTERVAL).await;
            }

            let url = self.api(&format!("/projects/{}/queries/{}", project, job.job_id));
            let mut query: Vec<(&str, String)> = vec![("timeoutMs", QUERY_TIMEOUT_MS.to_string())];
            if let Some(location) = job.location.as_ref().or(self.config.location.as_ref()) {
                query.push(("location", location.clone()));
            }
            if complete && let Some(page_token) = page_token {
                query.push(("pageToken", page_token));
            }
            response = send_json(self.client.get(url).bearer_auth(&token).query(&query))
                .await
                .map_err(|e| query_error(sql, e))?;
        }
        Ok(pages)
    }

    async fn table_exists(&mut self, table: &TableReference) -> Result<bool> {
        let (_, token) = self.authorize().await?;
        let url = self.api(&table_path(table));
        match send_unit(self.client.get(url).bearer_auth(&token)).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(DeltaGuardError::read_failed(
                format!("Failed to look up {}", table.sql_path()),
                e,
            )),
        }
    }

    async fn create_table(&mut self, table: &TableReference, data: &Recordset) -> Result<()> {
        let (_, token) = self.authorize().await?;
        let url = self.api(&format!(
            "/projects/{}/datasets/{}/tables",
            table.project_id, table.dataset_id
        ));
        let resource = TableResource {
            table_reference: table,
            schema: values::schema_for(data),
        };
        send_unit(self.client.post(url).bearer_auth(&token).json(&resource))
            .await
            .map_err(|e| {
                DeltaGuardError::write_failed(format!("Failed to create {}", table.sql_path()), e)
            })
    }

    async fn drop_table(&mut self, table: &TableReference) -> Result<()> {
        let (_, token) = self.authorize().await?;
        let url = self.api(&table_path(table));
        match send_unit(self.client.delete(url).bearer_auth(&token)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(DeltaGuardError::write_failed(
                format!("Failed to delete {}", table.sql_path()),
                e,
            )),
        }
    }

    /// Uploads rows with a multipart load job and waits for it.
    async fn load_rows(&mut self, table: &TableReference, data: &Recordset) -> Result<()> {
        let (project, token) = self.authorize().await?;
        let job_id = format!("deltaguard_load_{}", uuid::Uuid::new_v4().simple());
        let metadata = api::load_job_body(table, &job_id, self.config.location.as_deref());

        let body = format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n\
             --{b}\r\nContent-Type: application/octet-stream\r\n\r\n{rows}\r\n--{b}--\r\n",
            b = MULTIPART_BOUNDARY,
            meta = metadata,
            rows = values::ndjson(data),
        );
        let url = self.upload(&format!("/projects/{}/jobs", project));
        let request = self
            .client
            .post(url)
            .bearer_auth(&token)
            .query(&[("uploadType", "multipart")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body);

        let load_err = |e: HttpError| {
            DeltaGuardError::write_failed(format!("Load job into {} failed", table.sql_path()), e)
        };
        let mut job: Job = send_json(request).await.map_err(load_err)?;

        let mut polls = 0;
        while !job.status.is_done() {
            polls += 1;
            if polls > MAX_JOB_POLLS {
                return Err(DeltaGuardError::write_failed(
                    format!("Load job {} did not finish", job.job_reference.job_id),
                    "timed out",
                ));
            }
            tokio::time::sleep(JOB_POLL_INTERVAL).await;
            let url = self.api(&format!(
                "/projects/{}/jobs/{}",
                project, job.job_reference.job_id
            ));
            let mut request = self.client.get(url).bearer_auth(&token);
            if let Some(location) = &job.job_reference.location {
                request = request.query(&[("location", location)]);
            }
            job = send_json(request).await.map_err(load_err)?;
        }

        match job.status.error_result {
            Some(error) => Err(DeltaGuardError::write_failed(
                format!("Load job into {} failed", table.sql_path()),
                error,
            )),
            None => Ok(()),
        }
    }
}

fn table_path(table: &TableReference) -> String {
    format!(
        "/projects/{}/datasets/{}/tables/{}",
        table.project_id, table.dataset_id, table.table_id
    )
}

fn query_error(sql: &str, error: HttpError) -> DeltaGuardError {
    let context = format!("BigQuery query failed: {}", sql);
    match error.status().map(|s| s.as_u16()) {
        Some(401 | 403) => DeltaGuardError::connection_failed(context, error),
        _ => DeltaGuardError::read_failed(context, error),
    }
}

#[async_trait]
impl Provider for BigQueryProvider {
    fn backend(&self) -> BackendKind {
        BackendKind::BigQuery
    }

    async fn connect(&mut self) -> Result<()> {
        let (project, token) = self.authorize().await?;
        // Smoke test: the credentials can list the project's datasets
        let url = self.api(&format!("/projects/{}/datasets", project));
        let request = self
            .client
            .get(url)
            .bearer_auth(&token)
            .query(&[("maxResults", "1")]);
        if let Err(e) = send_unit(request).await {
            self.session = None;
            return Err(DeltaGuardError::connection_failed(
                format!("Cannot reach BigQuery project {}", project),
                e,
            ));
        }
        tracing::debug!(project = %project, "BigQuery session established");
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        self.run_query("SELECT 1").await.map(|_| ())
    }

    async fn probe_read(&mut self) -> Result<()> {
        self.run_query("SELECT 1").await.map(|_| ())
    }

    async fn probe_write(&mut self) -> Result<()> {
        if self.config.dataset.as_deref().is_none_or(str::is_empty) {
            tracing::debug!("No default dataset; write probe skipped");
            return Ok(());
        }
        let (project, _) = self.authorize().await?;
        let table = self.table_reference(&project, PROBE_TABLE)?;
        let probe = Recordset::empty(vec![crate::models::Column::new(
            "c",
            crate::models::ColumnKind::Text,
        )]);
        if !self.table_exists(&table).await? {
            self.create_table(&table, &probe).await?;
        }
        self.drop_table(&table).await
    }

    async fn list_datasets(&mut self) -> Result<Vec<String>> {
        let (project, token) = self.authorize().await?;
        let url = self.api(&format!("/projects/{}/datasets", project));
        let mut datasets = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.client.get(&url).bearer_auth(&token);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page)]);
            }
            let page: DatasetList = send_json(request).await.map_err(|e| {
                DeltaGuardError::read_failed(format!("Failed to list datasets of {}", project), e)
            })?;
            datasets.extend(page.datasets.into_iter().map(|d| d.dataset_reference.dataset_id));
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(datasets)
    }

    async fn list_tables(&mut self, dataset: Option<&str>) -> Result<Vec<String>> {
        let Some(dataset) = dataset
            .or(self.config.dataset.as_deref())
            .filter(|d| !d.is_empty())
            .map(str::to_string)
        else {
            return Ok(Vec::new());
        };

        let (project, token) = self.authorize().await?;
        let url = self.api(&format!("/projects/{}/datasets/{}/tables", project, dataset));
        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.client.get(&url).bearer_auth(&token);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page)]);
            }
            let page: TableList = send_json(request).await.map_err(|e| {
                DeltaGuardError::read_failed(format!("Failed to list tables of {}", dataset), e)
            })?;
            tables.extend(page.tables.into_iter().map(|t| t.table_reference.table_id));
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(tables)
    }

    async fn read_table(&mut self, name: &str, limit: Option<usize>) -> Result<Recordset> {
        let (project, _) = self.authorize().await?;
        let table = self.table_reference(&project, name)?;
        let sql = SqlDialect::BigQuery.select(&table.sql_path(), "*", limit);
        let pages = self.run_query(&sql).await?;

        let schema = pages
            .iter()
            .find_map(|page| page.schema.clone())
            .unwrap_or_default();
        let columns = values::columns_of(&schema);
        let null = Value::Null;
        let rows = pages
            .into_iter()
            .flat_map(|page| page.rows)
            .map(|row| {
                schema
                    .fields
                    .iter()
                    .zip(row.f.iter().map(|cell| &cell.v).chain(std::iter::repeat(&null)))
                    .map(|(field, raw)| values::cell_value(raw, field))
                    .collect()
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
        let (project, _) = self.authorize().await?;
        let table = self.table_reference(&project, name)?;

        if mode == WriteMode::Replace {
            self.drop_table(&table).await?;
        }
        if !self.table_exists(&table).await? {
            self.create_table(&table, data).await?;
        }
        if !data.is_empty() {
            self.load_rows(&table, data).await?;
        }

        tracing::info!(table = %table.sql_path(), rows = data.len(), %mode, "BigQuery table written");
        Ok(data.len() as u64)
    }

    async fn delete_rows(&mut self, name: &str, predicate: Option<&str>) -> Result<u64> {
        let (project, _) = self.authorize().await?;
        let table = self.table_reference(&project, name)?;
        let sql = SqlDialect::BigQuery.delete(&table.sql_path(), predicate);
        let pages = self.run_query(&sql).await.map_err(|e| match e {
            DeltaGuardError::Read { context, source } => DeltaGuardError::Write { context, source },
            other => other,
        })?;
        Ok(pages
            .iter()
            .find_map(|page| page.num_dml_affected_rows.as_deref())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0))
    }

    async fn delete_table(&mut self, name: &str) -> Result<()> {
        let (project, _) = self.authorize().await?;
        let table = self.table_reference(&project, name)?;
        self.drop_table(&table).await
    }

    async fn close(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("BigQuery session closed");
        }
    }
}
