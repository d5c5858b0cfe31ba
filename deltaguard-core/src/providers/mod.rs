//! Provider contract and registry for uniform table access.
//!
//! Every storage backend implements [`Provider`], a whole-table CRUD contract
//! that the migration, quality and correction stages operate through. The
//! registry ([`create_provider`]) maps a [`ProviderConfig`] to a boxed
//! provider; backends compiled out by cargo features are reported as
//! unsupported rather than silently missing.
//!
//! # Module Structure
//! - `config`: Per-backend configuration and the tagged `ProviderConfig`
//! - `helpers`: Probe reporting and shared value conversion
//! - `sql`: Dialect-aware identifier quoting and DDL generation
//! - Backend modules (sqlite, postgres (also Redshift), mysql, bigquery,
//!   snowflake, s3)
//!
//! # Lifecycle
//! Providers are constructed unconnected. `connect` is idempotent and every
//! data operation connects lazily. `close` is infallible and idempotent; use
//! [`with_provider`] to guarantee it runs on every exit path.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{
    Result,
    error::DeltaGuardError,
    models::{BackendKind, Capability, PermissionReport, Recordset, WriteMode},
};

pub mod config;
pub mod helpers;
pub mod sql;

#[cfg(any(feature = "bigquery", feature = "snowflake"))]
pub mod http;

#[cfg(feature = "bigquery")]
pub mod bigquery;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgresql")]
pub mod postgres;
#[cfg(feature = "s3")]
pub mod s3;
#[cfg(feature = "snowflake")]
pub mod snowflake;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::ProviderConfig;

/// Uniform table access over one storage backend.
///
/// A provider owns at most one backend session and is driven by one caller
/// at a time, hence `&mut self` throughout.
///
/// # Errors
/// Data operations return typed [`DeltaGuardError`] variants: `Connection`
/// for session failures, `Read`/`Write` for rejected operations, `Query` for
/// malformed predicates. `test_connection` and `has_permissions` never fail;
/// they log the underlying error and report `false`.
#[async_trait]
pub trait Provider: Send {
    /// Backend tag of this provider.
    fn backend(&self) -> BackendKind;

    /// Establishes the underlying session. Safe to call repeatedly.
    async fn connect(&mut self) -> Result<()>;

    /// Minimal round trip against an established session.
    async fn ping(&mut self) -> Result<()>;

    /// Read-only probe used by [`Provider::has_permissions`].
    async fn probe_read(&mut self) -> Result<()>;

    /// Create-then-delete probe used by [`Provider::has_permissions`].
    ///
    /// Must not leave a residual artifact whether it succeeds or fails.
    async fn probe_write(&mut self) -> Result<()>;

    /// `connect` plus `ping`, reported as a boolean.
    async fn test_connection(&mut self) -> bool {
        let backend = self.backend();
        let outcome = match self.connect().await {
            Ok(()) => self.ping().await,
            Err(e) => Err(e),
        };
        helpers::report_probe(backend, "connection", outcome)
    }

    /// Probes each requested capability and reports per-capability results.
    async fn has_permissions(&mut self, capabilities: &[Capability]) -> PermissionReport {
        let backend = self.backend();
        let mut report = PermissionReport::default();
        for &capability in capabilities {
            let outcome = match self.connect().await {
                Ok(()) => match capability {
                    Capability::Read => self.probe_read().await,
                    Capability::Write => self.probe_write().await,
                },
                Err(e) => Err(e),
            };
            report.insert(
                capability,
                helpers::report_probe(backend, capability.as_str(), outcome),
            );
        }
        report
    }

    /// Logical containers (databases, datasets, buckets).
    async fn list_datasets(&mut self) -> Result<Vec<String>>;

    /// Addressable tables or object keys, optionally within `dataset`.
    async fn list_tables(&mut self, dataset: Option<&str>) -> Result<Vec<String>>;

    /// Reads the whole table, or its first `limit` rows when positive.
    async fn read_table(&mut self, name: &str, limit: Option<usize>) -> Result<Recordset>;

    /// Writes `data`, creating the target if absent. Returns rows written.
    async fn write_table(&mut self, name: &str, data: &Recordset, mode: WriteMode)
    -> Result<u64>;

    /// Deletes rows matching a trusted, backend-native predicate, or all rows.
    ///
    /// Returns the number deleted, `0` when the backend cannot report it.
    async fn delete_rows(&mut self, name: &str, predicate: Option<&str>) -> Result<u64>;

    /// Removes the table or object. Missing targets are not an error.
    async fn delete_table(&mut self, name: &str) -> Result<()>;

    /// Releases the session. Never fails, safe when never connected.
    async fn close(&mut self);
}

/// Factory function creating an unconnected provider from its configuration.
///
/// # Errors
/// Returns `Configuration` when required fields are missing and
/// `UnsupportedFeature` when the backend was not compiled in.
///
/// # Example
/// ```rust,no_run
/// use deltaguard_core::providers::{ProviderConfig, create_provider};
///
/// let config = ProviderConfig::from_url("sqlite:///tmp/warehouse.db")?;
/// let provider = create_provider(config)?;
/// assert_eq!(provider.backend().as_str(), "sqlite");
/// # Ok::<(), deltaguard_core::DeltaGuardError>(())
/// ```
pub fn create_provider(config: ProviderConfig) -> Result<Box<dyn Provider>> {
    config.validate()?;
    tracing::debug!(backend = %config.backend(), "Creating provider: {}", config);

    match config {
        #[cfg(feature = "sqlite")]
        ProviderConfig::Sqlite(c) => Ok(Box::new(sqlite::SqliteProvider::new(c))),
        #[cfg(feature = "postgresql")]
        ProviderConfig::Postgres(c) => Ok(Box::new(postgres::PostgresProvider::postgres(c))),
        #[cfg(feature = "redshift")]
        ProviderConfig::Redshift(c) => Ok(Box::new(postgres::PostgresProvider::redshift(c))),
        #[cfg(feature = "mysql")]
        ProviderConfig::MySql(c) => Ok(Box::new(mysql::MySqlProvider::new(c))),
        #[cfg(feature = "bigquery")]
        ProviderConfig::BigQuery(c) => Ok(Box::new(bigquery::BigQueryProvider::new(c)?)),
        #[cfg(feature = "snowflake")]
        ProviderConfig::Snowflake(c) => Ok(Box::new(snowflake::SnowflakeProvider::new(c)?)),
        #[cfg(feature = "s3")]
        ProviderConfig::S3(c) => Ok(Box::new(s3::S3Provider::new(c))),
        #[allow(unreachable_patterns)]
        other => Err(DeltaGuardError::unsupported_feature(
            format!("{} provider", other.backend()),
            format!(
                "this build (compile with --features {} to enable it)",
                feature_for(other.backend())
            ),
        )),
    }
}

/// Loads a configuration from a JSON file path or connection URL and
/// creates the provider.
pub fn create_provider_from(source: &str) -> Result<Box<dyn Provider>> {
    create_provider(ProviderConfig::load(source)?)
}

/// Backends compiled into this build.
pub fn supported_backends() -> Vec<BackendKind> {
    BackendKind::ALL
        .into_iter()
        .filter(|kind| is_compiled(*kind))
        .collect()
}

fn is_compiled(kind: BackendKind) -> bool {
    match kind {
        BackendKind::Sqlite => cfg!(feature = "sqlite"),
        BackendKind::Postgres => cfg!(feature = "postgresql"),
        BackendKind::MySql => cfg!(feature = "mysql"),
        BackendKind::Redshift => cfg!(feature = "redshift"),
        BackendKind::BigQuery => cfg!(feature = "bigquery"),
        BackendKind::Snowflake => cfg!(feature = "snowflake"),
        BackendKind::S3 => cfg!(feature = "s3"),
    }
}

fn feature_for(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Postgres => "postgresql",
        other => other.as_str(),
    }
}

/// Fails with `PermissionDenied` unless the capability probe succeeds.
///
/// Every mutating path (corrections, deletes) goes through this guard.
pub async fn require_permission(
    provider: &mut dyn Provider,
    capability: Capability,
) -> Result<()> {
    let report = provider.has_permissions(&[capability]).await;
    if report.is_granted(capability) {
        Ok(())
    } else {
        Err(DeltaGuardError::permission_denied(
            capability.as_str(),
            provider.backend().as_str(),
        ))
    }
}

/// Runs `operation` against the provider, then always closes it.
///
/// The operation's result is returned unchanged after `close` has run,
/// whether it succeeded or failed.
///
/// # Example
/// ```rust,no_run
/// use deltaguard_core::providers::{create_provider_from, with_provider};
///
/// # async fn demo() -> deltaguard_core::Result<()> {
/// let provider = create_provider_from("sqlite:///tmp/warehouse.db")?;
/// let tables = with_provider(provider, |p| Box::pin(async move {
///     p.list_tables(None).await
/// }))
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_provider<T, F>(mut provider: Box<dyn Provider>, operation: F) -> Result<T>
where
    F: for<'p> FnOnce(&'p mut dyn Provider) -> BoxFuture<'p, Result<T>>,
{
    let outcome = operation(provider.as_mut()).await;
    provider.close().await;
    outcome
}

/// Two-provider variant of [`with_provider`]; both are closed afterwards.
pub async fn with_providers<T, F>(
    mut source: Box<dyn Provider>,
    mut destination: Box<dyn Provider>,
    operation: F,
) -> Result<T>
where
    F: for<'p> FnOnce(&'p mut dyn Provider, &'p mut dyn Provider) -> BoxFuture<'p, Result<T>>,
{
    let outcome = operation(source.as_mut(), destination.as_mut()).await;
    source.close().await;
    destination.close().await;
    outcome
}
