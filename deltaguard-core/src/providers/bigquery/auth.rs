//! OAuth access tokens for BigQuery.
//!
//! A service-account key is exchanged for an access token with a signed
//! RS256 JWT grant. Tokens are cached until shortly before they expire.

use std::path::Path;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    error::DeltaGuardError,
    providers::http::{HttpError, send_json},
    security::Secret,
};

const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the reported expiry
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Fields of a service-account JSON key file
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: Secret,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Reads and parses a key file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DeltaGuardError::io(format!("Failed to read key file {}", path.display()), e)
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| DeltaGuardError::serialization("Invalid service-account key file", e))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Source of bearer tokens for API calls
#[derive(Debug)]
pub enum TokenSource {
    /// Pre-issued token supplied in configuration
    Static(Secret),
    /// Service-account key with a cached exchanged token
    ServiceAccount {
        key: ServiceAccountKey,
        cached: Option<(Secret, Instant)>,
    },
}

impl TokenSource {
    pub fn service_account(key: ServiceAccountKey) -> Self {
        TokenSource::ServiceAccount { key, cached: None }
    }

    /// Current access token, exchanging a new one when needed.
    pub async fn token(&mut self, client: &Client) -> Result<Secret> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount { key, cached } => {
                if let Some((token, expires_at)) = cached.as_ref()
                    && Instant::now() + REFRESH_MARGIN < *expires_at
                {
                    return Ok(token.clone());
                }
                let (token, lifetime) = exchange(client, key).await?;
                *cached = Some((token.clone(), Instant::now() + lifetime));
                Ok(token)
            }
        }
    }
}

/// Signs the JWT grant for `key`.
pub fn signed_assertion(key: &ServiceAccountKey, issued_at: i64) -> Result<String> {
    let claims = Claims {
        iss: &key.client_email,
        scope: BIGQUERY_SCOPE,
        aud: &key.token_uri,
        iat: issued_at,
        exp: issued_at + TOKEN_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose().as_bytes())
        .map_err(|e| DeltaGuardError::configuration(format!("Invalid service-account private key: {}", e)))?;
    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|e| DeltaGuardError::configuration(format!("Failed to sign token request: {}", e)))
}

async fn exchange(client: &Client, key: &ServiceAccountKey) -> Result<(Secret, Duration)> {
    let assertion = signed_assertion(key, chrono::Utc::now().timestamp())?;
    let request = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())]);

    let response: TokenResponse = send_json(request).await.map_err(|e: HttpError| {
        DeltaGuardError::connection_failed(
            format!("Token exchange for {} failed", key.client_email),
            e,
        )
    })?;

    tracing::debug!(account = %key.client_email, "Obtained BigQuery access token");
    let lifetime = Duration::from_secs(response.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64));
    Ok((Secret::new(response.access_token), lifetime))
}
