//! Connection pool creation for PostgreSQL and Redshift.

use sqlx::{
    Executor, PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};

use crate::{
    Result,
    error::DeltaGuardError,
    providers::{config::SqlServerConfig, sql::SqlDialect},
};

/// Opens a pool and verifies the first connection.
///
/// PostgreSQL sessions get a UTC timezone and an application name on every
/// pooled connection. Redshift rejects the `extra_float_digits` startup
/// parameter, so it is omitted there.
pub(super) async fn open_pool(
    config: &SqlServerConfig,
    dialect: SqlDialect,
    database: &str,
    port: u16,
) -> Result<PgPool> {
    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(port)
        .database(database)
        .username(&config.user)
        .application_name(concat!("deltaguard-", env!("CARGO_PKG_VERSION")));
    if let Some(password) = &config.password {
        options = options.password(password.expose());
    }
    if dialect == SqlDialect::Redshift {
        options = options.extra_float_digits(None);
    }

    let mut pool_options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout());
    if dialect == SqlDialect::Postgres {
        pool_options = pool_options.after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET timezone = 'UTC'").await?;
                Ok(())
            })
        });
    }

    let pool = pool_options.connect_with(options).await.map_err(|e| {
        DeltaGuardError::connection_failed(
            format!(
                "Failed to connect to {}:{}/{} as {}",
                config.host, port, database, config.user
            ),
            e,
        )
    })?;

    tracing::debug!(host = %config.host, port, database, "Connection pool opened");
    Ok(pool)
}
