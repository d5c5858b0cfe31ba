//! Snowflake key-pair JWT and OAuth bearer tokens.

use std::path::Path;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::{Result, error::DeltaGuardError, providers::config::SnowflakeConfig, security::Secret};

const JWT_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// Bearer credential for the SQL API
pub enum Credential {
    OAuth(Secret),
    KeyPair {
        qualified_user: String,
        fingerprint: String,
        key: EncodingKey,
        cached: Option<(Secret, Instant)>,
    },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::OAuth(_) => f.write_str("Credential::OAuth([REDACTED])"),
            Credential::KeyPair { qualified_user, .. } => {
                write!(f, "Credential::KeyPair({})", qualified_user)
            }
        }
    }
}

impl Credential {
    /// Builds the credential from configuration, preferring key-pair auth.
    pub fn from_config(config: &SnowflakeConfig) -> Result<Self> {
        if let Some(path) = &config.private_key_path {
            let fingerprint = config.public_key_fingerprint.clone().ok_or_else(|| {
                DeltaGuardError::configuration("snowflake: public_key_fingerprint is required")
            })?;
            return Ok(Credential::KeyPair {
                qualified_user: qualified_user(&config.account, &config.user),
                fingerprint,
                key: load_private_key(path)?,
                cached: None,
            });
        }
        config
            .token
            .clone()
            .map(Credential::OAuth)
            .ok_or_else(|| DeltaGuardError::configuration("snowflake: no credential configured"))
    }

    /// Value of `X-Snowflake-Authorization-Token-Type`
    pub fn token_type(&self) -> &'static str {
        match self {
            Credential::OAuth(_) => "OAUTH",
            Credential::KeyPair { .. } => "KEYPAIR_JWT",
        }
    }

    /// Current bearer token, re-signing the JWT when it nears expiry.
    pub fn bearer(&mut self) -> Result<Secret> {
        match self {
            Credential::OAuth(token) => Ok(token.clone()),
            Credential::KeyPair {
                qualified_user,
                fingerprint,
                key,
                cached,
            } => {
                if let Some((token, expires_at)) = cached.as_ref()
                    && Instant::now() + REFRESH_MARGIN < *expires_at
                {
                    return Ok(token.clone());
                }
                let token = Secret::new(sign_jwt(
                    qualified_user,
                    fingerprint,
                    key,
                    chrono::Utc::now().timestamp(),
                )?);
                let lifetime = Duration::from_secs(JWT_LIFETIME_SECS as u64);
                *cached = Some((token.clone(), Instant::now() + lifetime));
                Ok(token)
            }
        }
    }
}

/// `ACCOUNT.USER`, with any region or cloud suffix dropped from the account.
pub fn qualified_user(account: &str, user: &str) -> String {
    let account = account.split('.').next().unwrap_or(account);
    format!("{}.{}", account.to_ascii_uppercase(), user.to_ascii_uppercase())
}

fn load_private_key(path: &Path) -> Result<EncodingKey> {
    let pem = std::fs::read(path).map_err(|e| {
        DeltaGuardError::io(format!("Failed to read private key {}", path.display()), e)
    })?;
    EncodingKey::from_rsa_pem(&pem)
        .map_err(|e| DeltaGuardError::configuration(format!("snowflake: invalid private key: {}", e)))
}

/// Signs the key-pair JWT: `iss` is `ACCOUNT.USER.SHA256:...`, `sub` is
/// `ACCOUNT.USER`.
pub fn sign_jwt(
    qualified_user: &str,
    fingerprint: &str,
    key: &EncodingKey,
    issued_at: i64,
) -> Result<String> {
    let claims = Claims {
        iss: format!("{}.{}", qualified_user, fingerprint),
        sub: qualified_user.to_string(),
        iat: issued_at,
        exp: issued_at + JWT_LIFETIME_SECS,
    };
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, key)
        .map_err(|e| DeltaGuardError::configuration(format!("snowflake: failed to sign JWT: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_user_strips_region() {
        assert_eq!(qualified_user("xy12345.us-east-2.aws", "etl"), "XY12345.ETL");
        assert_eq!(qualified_user("acme-prod", "Loader"), "ACME-PROD.LOADER");
    }

    #[test]
    fn test_oauth_credential() {
        let config = SnowflakeConfig {
            account: "acme".to_string(),
            database: "DB".to_string(),
            token: Some(Secret::new("oauth-token")),
            ..SnowflakeConfig::default()
        };
        let mut credential = Credential::from_config(&config).unwrap();
        assert_eq!(credential.token_type(), "OAUTH");
        assert_eq!(credential.bearer().unwrap().expose(), "oauth-token");
        assert!(!format!("{:?}", credential).contains("oauth-token"));
    }

    #[test]
    fn test_missing_key_file_is_io_error() {
        let config = SnowflakeConfig {
            account: "acme".to_string(),
            user: "etl".to_string(),
            database: "DB".to_string(),
            private_key_path: Some("/nonexistent/rsa_key.p8".into()),
            public_key_fingerprint: Some("SHA256:abc".to_string()),
            ..SnowflakeConfig::default()
        };
        assert!(matches!(
            Credential::from_config(&config),
            Err(DeltaGuardError::Io { .. })
        ));
    }
}
