//! Configuration for the embedded and row-store SQL backends.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::{Result, error::DeltaGuardError, security::Secret};

/// Configuration for an embedded SQLite database file.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    /// Database file path; created on first connect if absent
    #[serde(default)]
    pub path: PathBuf,
}

impl SqliteConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Whether the path names SQLite's in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if the database path is empty
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(DeltaGuardError::configuration(
                "sqlite: path cannot be empty",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for SqliteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteConfig({})", self.path.display())
    }
}

/// Connection settings for PostgreSQL, MySQL and Redshift.
///
/// # Security
/// The password is held in a [`Secret`] and is never displayed.
///
/// # Example
/// ```rust
/// use deltaguard_core::providers::config::SqlServerConfig;
///
/// let config = SqlServerConfig::new("db.internal", "analytics")
///     .with_port(5432)
///     .with_user("etl")
///     .with_password("secret");
///
/// assert!(config.validate().is_ok());
/// assert!(!config.to_string().contains("secret"));
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SqlServerConfig {
    /// Server host
    #[serde(default)]
    pub host: String,
    /// Server port; the backend default applies when absent
    #[serde(default)]
    pub port: Option<u16>,
    /// Database name (also the table schema on MySQL)
    #[serde(default)]
    pub database: String,
    /// Login user
    #[serde(default, alias = "username")]
    pub user: String,
    /// Login password
    #[serde(default)]
    pub password: Option<Secret>,
    /// Schema for unqualified table names (PostgreSQL and Redshift)
    #[serde(default)]
    pub schema: Option<String>,
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl SqlServerConfig {
    /// Creates a config for `database` on `host` with defaults elsewhere.
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            database: database.into(),
            user: String::new(),
            password: None,
            schema: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<Secret>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Connect timeout as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Configured port or the backend default
    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }

    /// Configured database, or `default` when left empty
    pub fn database_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.database.trim() {
            "" => default,
            database => database,
        }
    }

    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns error if a required field is empty or a limit is out of range
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(DeltaGuardError::configuration("database cannot be empty"));
        }
        self.validate_with_default_database()
    }

    /// Same as [`Self::validate`] but allows an empty database, for backends
    /// that supply their own default (Redshift's `dev`).
    pub fn validate_with_default_database(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DeltaGuardError::configuration("host cannot be empty"));
        }
        if self.user.trim().is_empty() {
            return Err(DeltaGuardError::configuration("user cannot be empty"));
        }
        if self.port == Some(0) {
            return Err(DeltaGuardError::configuration(
                "port must be greater than 0",
            ));
        }
        if self.max_connections == 0 || self.max_connections > 100 {
            return Err(DeltaGuardError::configuration(
                "max_connections must be between 1 and 100",
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(DeltaGuardError::configuration(
                "connect_timeout_secs must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for SqlServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SqlServerConfig({}{}/{})",
            self.host,
            self.port.map_or_else(String::new, |p| format!(":{}", p)),
            self.database
        )
        // user and password are intentionally omitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_config_validation() {
        assert!(SqliteConfig::new("data/app.db").validate().is_ok());
        assert!(SqliteConfig::new("").validate().is_err());
        assert!(SqliteConfig::new(":memory:").is_in_memory());
    }

    #[test]
    fn test_sql_server_config_validation() {
        let valid = SqlServerConfig::new("localhost", "dev").with_user("admin");
        assert!(valid.validate().is_ok());

        assert!(SqlServerConfig::new("", "dev").with_user("a").validate().is_err());
        assert!(SqlServerConfig::new("h", "").with_user("a").validate().is_err());
        assert!(SqlServerConfig::new("h", "dev").validate().is_err());
        assert!(
            SqlServerConfig::new("h", "dev")
                .with_user("a")
                .with_port(0)
                .validate()
                .is_err()
        );

        let no_database = SqlServerConfig::new("cluster", "").with_user("a");
        assert!(no_database.validate().is_err());
        assert!(no_database.validate_with_default_database().is_ok());
        assert_eq!(no_database.database_or("dev"), "dev");

        let too_many = SqlServerConfig {
            max_connections: 101,
            ..valid
        };
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn test_sql_server_config_deserialize_defaults() {
        let config: SqlServerConfig = serde_json::from_str(
            r#"{"host": "h", "database": "d", "username": "u", "password": "p"}"#,
        )
        .unwrap();

        assert_eq!(config.user, "u");
        assert_eq!(config.port_or(5439), 5439);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.password.as_ref().map(Secret::expose), Some("p"));
    }

    #[test]
    fn test_display_omits_credentials() {
        let config = SqlServerConfig::new("db", "sales")
            .with_port(3306)
            .with_user("root")
            .with_password("hunter2");
        let shown = config.to_string();
        assert_eq!(shown, "SqlServerConfig(db:3306/sales)");
    }
}
