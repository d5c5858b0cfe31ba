//! Configuration for the S3 object-storage backend.

use serde::Deserialize;

use crate::{Result, error::DeltaGuardError, security::Secret};

/// S3 bucket, key layout and credentials.
///
/// Credentials are optional: when absent the store falls back to the AWS
/// environment (instance profile, `AWS_*` variables).
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    #[serde(default, alias = "aws_access_key_id")]
    pub access_key_id: Option<Secret>,
    #[serde(default, alias = "aws_secret_access_key")]
    pub secret_access_key: Option<Secret>,
    #[serde(default, alias = "aws_session_token")]
    pub session_token: Option<Secret>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Bucket holding the objects; required to connect
    #[serde(default)]
    pub bucket: Option<String>,
    /// Key prefix prepended to every table name
    #[serde(default)]
    pub prefix: Option<String>,
    /// Object key used when a table name is empty
    #[serde(default)]
    pub key: Option<String>,
    /// Custom endpoint (MinIO, LocalStack)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Permit plain HTTP endpoints
    #[serde(default)]
    pub allow_http: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            region: default_region(),
            bucket: None,
            prefix: None,
            key: None,
            endpoint: None,
            allow_http: false,
        }
    }
}

impl S3Config {
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Configured bucket, or a `Configuration` error
    pub fn require_bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| DeltaGuardError::configuration("s3: bucket is required"))
    }

    /// Full object key for a table name, applying the default key and prefix.
    ///
    /// # Errors
    /// Returns error when both the name and the default key are empty
    pub fn object_key(&self, name: &str) -> Result<String> {
        let name = name.trim().trim_start_matches('/');
        let key = if name.is_empty() {
            self.key
                .as_deref()
                .map(|k| k.trim_start_matches('/'))
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    DeltaGuardError::configuration("s3: table name or default key is required")
                })?
        } else {
            name
        };

        match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() && !key.starts_with(&format!("{prefix}/")) => {
                Ok(format!("{prefix}/{key}"))
            }
            _ => Ok(key.to_string()),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if only one half of a static key pair is set
    pub fn validate(&self) -> Result<()> {
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(DeltaGuardError::configuration(
                "s3: access_key_id and secret_access_key must be set together",
            ));
        }
        if self.region.trim().is_empty() {
            return Err(DeltaGuardError::configuration("s3: region cannot be empty"));
        }
        Ok(())
    }
}

impl std::fmt::Display for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "S3Config(s3://{}/{} in {})",
            self.bucket.as_deref().unwrap_or("<unset>"),
            self.prefix.as_deref().unwrap_or(""),
            self.region
        )
    }
}
