//! MySQL pool creation.

use sqlx::{
    MySqlPool,
    mysql::{MySqlConnectOptions, MySqlPoolOptions},
};

use super::MYSQL_PORT;
use crate::{Result, error::DeltaGuardError, providers::config::SqlServerConfig};

/// Opens a pool and verifies the first connection.
pub(super) async fn open_pool(config: &SqlServerConfig) -> Result<MySqlPool> {
    let port = config.port_or(MYSQL_PORT);
    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(port)
        .database(&config.database)
        .username(&config.user)
        .charset("utf8mb4")
        .timezone(Some(String::from("+00:00")));
    if let Some(password) = &config.password {
        options = options.password(password.expose());
    }

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout())
        .connect_with(options)
        .await
        .map_err(|e| {
            DeltaGuardError::connection_failed(
                format!(
                    "Failed to connect to MySQL {}:{}/{} as {}",
                    config.host, port, config.database, config.user
                ),
                e,
            )
        })?;

    tracing::debug!(host = %config.host, port, database = %config.database, "MySQL pool opened");
    Ok(pool)
}
