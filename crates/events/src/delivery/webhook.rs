//! Single-shot webhook delivery.
//!
//! [`WebhookDelivery`] POSTs a JSON [`WebhookPayload`] to the target's
//! configured URL. There is no retry: a failed POST is reported to the
//! caller and the alert is not re-sent.

use std::time::Duration;

use chrono::SecondsFormat;
use serde::Serialize;
use upwatch_core::alert::AlertTarget;
use upwatch_core::types::Timestamp;

/// Default HTTP request timeout for one delivery.
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// JSON body sent to alert webhooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    /// Target display name.
    pub target: String,
    pub url: String,
    pub message: String,
    /// ISO-8601 timestamp in UTC.
    pub timestamp: String,
}

impl WebhookPayload {
    pub fn new(target: &AlertTarget, message: &str, at: Timestamp) -> Self {
        Self {
            target: target.name.clone(),
            url: target.url.clone(),
            message: message.to_string(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers alert payloads to external webhook endpoints.
#[derive(Clone)]
pub struct WebhookDelivery {
    client: reqwest::Client,
}

impl WebhookDelivery {
    /// Create a delivery service whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// POST the payload once. Any non-2xx response is an error.
    pub async fn deliver(&self, url: &str, payload: &WebhookPayload) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
