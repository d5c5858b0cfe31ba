//! Configuration for the cloud warehouse backends.

use std::path::PathBuf;

use serde::Deserialize;

use crate::{Result, error::DeltaGuardError, security::Secret};

/// Environment variable naming a service-account key file
pub const GOOGLE_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// BigQuery project, default dataset and credentials.
///
/// Authentication uses, in order: `access_token`, `keyfile_path`, then the
/// key file named by `GOOGLE_APPLICATION_CREDENTIALS`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BigQueryConfig {
    /// Billing project; taken from the key file when absent
    #[serde(default, alias = "project")]
    pub project_id: Option<String>,
    /// Dataset for table names without a dataset part
    #[serde(default)]
    pub dataset: Option<String>,
    /// Service-account JSON key file
    #[serde(default, alias = "keyfile")]
    pub keyfile_path: Option<PathBuf>,
    /// Pre-issued OAuth access token
    #[serde(default)]
    pub access_token: Option<Secret>,
    /// Job location (for example `EU`)
    #[serde(default)]
    pub location: Option<String>,
    /// API root override
    #[serde(default)]
    pub api_base_url: Option<String>,
}

impl BigQueryConfig {
    /// Key file from the config or the environment
    pub fn resolved_keyfile(&self) -> Option<PathBuf> {
        self.keyfile_path
            .clone()
            .or_else(|| std::env::var_os(GOOGLE_CREDENTIALS_ENV).map(PathBuf::from))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if no credential source is available, or a project
    /// cannot be determined without a key file.
    pub fn validate(&self) -> Result<()> {
        let keyfile = self.resolved_keyfile();
        if self.access_token.is_none() && keyfile.is_none() {
            return Err(DeltaGuardError::configuration(format!(
                "bigquery: set access_token, keyfile_path or {}",
                GOOGLE_CREDENTIALS_ENV
            )));
        }
        if self.project_id.as_deref().is_none_or(str::is_empty) && keyfile.is_none() {
            return Err(DeltaGuardError::configuration(
                "bigquery: project_id is required when no key file is configured",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for BigQueryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BigQueryConfig({}{})",
            self.project_id.as_deref().unwrap_or("<keyfile project>"),
            self.dataset
                .as_ref()
                .map_or_else(String::new, |d| format!(".{}", d))
        )
    }
}

/// Snowflake account, session context and credentials.
///
/// Authentication uses either key-pair JWT (`private_key_path` plus the
/// `public_key_fingerprint` reported by `DESC USER`) or an OAuth `token`.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeConfig {
    /// Account identifier (`orgname-account` or locator)
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// PEM-encoded RSA private key for key-pair authentication
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    /// `SHA256:...` fingerprint of the registered public key
    #[serde(default)]
    pub public_key_fingerprint: Option<String>,
    /// OAuth access token
    #[serde(default)]
    pub token: Option<Secret>,
    /// Statement timeout in seconds
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,
    /// API root override; defaults to `https://<account>.snowflakecomputing.com`
    #[serde(default)]
    pub api_base_url: Option<String>,
}

fn default_statement_timeout_secs() -> u64 {
    300
}

impl Default for SnowflakeConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            user: String::new(),
            warehouse: None,
            database: String::new(),
            schema: None,
            role: None,
            private_key_path: None,
            public_key_fingerprint: None,
            token: None,
            statement_timeout_secs: default_statement_timeout_secs(),
            api_base_url: None,
        }
    }
}

impl SnowflakeConfig {
    /// API root for statement requests
    pub fn base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.snowflakecomputing.com",
                self.account.to_ascii_lowercase()
            ),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if identifiers are missing or no credential is configured
    pub fn validate(&self) -> Result<()> {
        if self.account.trim().is_empty() {
            return Err(DeltaGuardError::configuration(
                "snowflake: account cannot be empty",
            ));
        }
        if self.database.trim().is_empty() {
            return Err(DeltaGuardError::configuration(
                "snowflake: database cannot be empty",
            ));
        }
        let key_pair = self.private_key_path.is_some();
        if key_pair {
            if self.user.trim().is_empty() {
                return Err(DeltaGuardError::configuration(
                    "snowflake: user is required for key-pair authentication",
                ));
            }
            if self
                .public_key_fingerprint
                .as_deref()
                .is_none_or(|fp| !fp.starts_with("SHA256:"))
            {
                return Err(DeltaGuardError::configuration(
                    "snowflake: public_key_fingerprint must be the SHA256:... value from DESC USER",
                ));
            }
        } else if self.token.is_none() {
            return Err(DeltaGuardError::configuration(
                "snowflake: set private_key_path (key-pair) or token (OAuth)",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for SnowflakeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SnowflakeConfig({}/{}{})",
            self.account,
            self.database,
            self.schema
                .as_ref()
                .map_or_else(String::new, |s| format!(".{}", s))
        )
    }
}
