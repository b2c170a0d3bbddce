//! Mail source boundary.
//!
//! The pipeline's only contract with a mail provider: search a mailbox for
//! message ids, fetch raw messages by id. Raw messages must carry headers
//! (From/To/Cc/Subject/Date, optional In-Reply-To/References) and a body
//! structure the normalizer can walk. Authentication and pagination are the
//! adapter's business.
//!
//! Modules:
//! - gmail: Gmail API v1 adapter (caller supplies a bearer token)

pub mod gmail;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Raw wire types
// ============================================================================

/// A raw provider message, prior to normalization.
///
/// Field shape follows Gmail's `format=full` message resource, which is also
/// the least common denominator the normalizer expects: top-level id/thread
/// plus a possibly-nested MIME payload. Every field defaults so a sparse
/// provider response still deserializes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub payload: Option<RawPayload>,
}

/// One MIME part: headers, optional body data, optional nested parts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawPayload {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub headers: Vec<RawHeader>,
    #[serde(default)]
    pub body: Option<RawBody>,
    #[serde(default)]
    pub parts: Vec<RawPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawHeader {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawBody {
    /// URL-safe base64 body data.
    #[serde(default)]
    pub data: Option<String>,
}

impl RawMessage {
    /// Case-insensitive header lookup on the top-level payload.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref().and_then(|p| {
            p.headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.as_str())
        })
    }
}

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MailSourceError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token expired or revoked")]
    AuthExpired,
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Message {0} not found")]
    NotFound(String),
}

// ============================================================================
// MailSource trait
// ============================================================================

/// A mail provider, reduced to the two calls the pipeline needs.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Search a mailbox with a provider-syntax query; returns message ids.
    async fn search(
        &self,
        mailbox: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<String>, MailSourceError>;

    /// Fetch one raw message by id.
    async fn fetch(&self, mailbox: &str, id: &str) -> Result<RawMessage, MailSourceError>;
}

// ============================================================================
// Retry policy
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn status_is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(
    attempt: u32,
    policy: &RetryPolicy,
    retry_after: Option<&reqwest::header::HeaderValue>,
) -> Duration {
    if let Some(value) = retry_after.and_then(|v| v.to_str().ok()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Duration::from_secs(secs.min(30));
        }
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0))
        % 150;
    Duration::from_millis(base.saturating_add(jitter))
}

/// Send a request with bounded retries on 429/5xx/timeouts.
///
/// Honors Retry-After when present (capped at 30s), otherwise exponential
/// backoff with jitter. Non-retryable statuses are returned to the caller
/// for mapping.
pub async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, MailSourceError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return request.send().await.map_err(MailSourceError::Http);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if status_is_retryable(status) && attempt < attempts {
                    let delay = retry_delay(
                        attempt,
                        policy,
                        response.headers().get(reqwest::header::RETRY_AFTER),
                    );
                    log::warn!(
                        "mail source retry {}/{} after status {} (sleep {:?})",
                        attempt,
                        attempts,
                        status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                let retryable_transport = err.is_timeout() || err.is_connect();
                if retryable_transport && attempt < attempts {
                    let delay = retry_delay(attempt, policy, None);
                    log::warn!(
                        "mail source retry {}/{} after transport error: {} (sleep {:?})",
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(MailSourceError::Http(err));
            }
        }
    }

    Err(MailSourceError::Api {
        status: 0,
        message: "request exhausted retries".to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================
