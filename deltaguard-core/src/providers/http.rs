//! HTTP plumbing shared by the REST-based warehouse providers.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::{Result, error::DeltaGuardError};

/// Default request timeout for warehouse APIs.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body excerpt carried in an error
const MAX_ERROR_BODY: usize = 512;

/// Failure of a single API call.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("unexpected response body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Transport(e) => e.status(),
            HttpError::Decode(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

/// Creates the HTTP client used by one provider.
///
/// # Errors
/// Returns `Configuration` if the TLS backend cannot be initialised
pub fn create_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| DeltaGuardError::configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Sends a request and decodes a JSON body, treating non-2xx as an error.
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> std::result::Result<T, HttpError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(HttpError::Status {
            status,
            body: excerpt(&body),
        });
    }

    // Some endpoints (DELETE) answer with an empty body
    let body = if body.trim().is_empty() { "null" } else { body.as_str() };
    serde_json::from_str(body).map_err(HttpError::Decode)
}

/// Sends a request whose body is irrelevant, treating non-2xx as an error.
pub async fn send_unit(request: RequestBuilder) -> std::result::Result<(), HttpError> {
    send_json::<serde_json::Value>(request).await.map(|_| ())
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
