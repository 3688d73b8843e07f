//! Outbound calls to backend inference services
//!
//! A backend receives `POST <address>` with `{"prompt": "..."}` and answers with
//! a JSON object carrying an optional `text` field.

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Reasons a forwarding attempt can fail
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no response within {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("backend returned HTTP {status}")]
    Status { status: u16 },

    #[error("malformed response body: {0}")]
    MalformedBody(String),
}

impl BackendError {
    /// Metric label for this failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::MalformedBody(_) => "malformed_body",
        }
    }
}

/// Parsed backend reply
///
/// Fields other than `text` are ignored. A missing or `null` `text` is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BackendReply {
    pub text: Option<String>,
}

#[derive(Serialize)]
struct BackendRequest<'a> {
    prompt: &'a str,
}

/// Forwards a prompt to a backend address
///
/// Allows dependency injection of backends that don't make network calls.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send `prompt` to `address` and wait for the reply
    async fn generate(&self, address: &str, prompt: &str) -> Result<BackendReply, BackendError>;
}

/// HTTP backend built on a shared `reqwest::Client`
///
/// Every call is bounded by the configured timeout; expiry surfaces as
/// [`BackendError::Timeout`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpBackend {
    /// Create a backend whose calls time out after `timeout`
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client cannot be built (TLS backend init).
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                timeout_seconds: self.timeout.as_secs(),
            }
        } else {
            BackendError::Transport(err)
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn generate(&self, address: &str, prompt: &str) -> Result<BackendReply, BackendError> {
        let response = self
            .client
            .post(address)
            .json(&BackendRequest { prompt })
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        serde_json::from_slice::<BackendReply>(&body)
            .map_err(|e| BackendError::MalformedBody(e.to_string()))
    }
}
