//! Probe outcome types and classification rules.
//!
//! The HTTP client itself lives in `upwatch-monitor`; everything here is
//! pure so the classification table can be tested without a network.

use serde::Serialize;

use crate::status::TargetStatus;

/// Identifying `User-Agent` sent with every probe unless overridden.
pub const DEFAULT_PROBE_USER_AGENT: &str = "Upwatch-Monitor/1.0";

/// Status code recorded when no HTTP response was received.
pub const NO_STATUS_CODE: u16 = 0;

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

/// Coarse classification of a failed probe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailureKind {
    /// No response within the probe timeout.
    Timeout,
    /// Redirect limit exceeded or redirect loop.
    Redirect,
    /// TCP connection refused or reset.
    Connect,
    /// Host name could not be resolved.
    Dns,
    /// TLS handshake or certificate failure.
    Tls,
    /// The URL could not be turned into a request.
    InvalidUrl,
    /// Any other transport failure.
    Request,
}

impl ProbeFailureKind {
    /// Status implied by this failure.
    ///
    /// Timeouts and redirect problems cannot establish reachability, so they
    /// are `unknown`; everything else is a definite `down`.
    pub fn status(self) -> TargetStatus {
        match self {
            Self::Timeout | Self::Redirect => TargetStatus::Unknown,
            Self::Connect | Self::Dns | Self::Tls | Self::InvalidUrl | Self::Request => {
                TargetStatus::Down
            }
        }
    }
}

/// A failed probe request: its classification plus the transport message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeFailure {
    pub kind: ProbeFailureKind,
    pub message: String,
}

impl ProbeFailure {
    pub fn new(kind: ProbeFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProbeOutcome
// ---------------------------------------------------------------------------

/// The classified result of one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    pub status: TargetStatus,
    /// HTTP status code, or [`NO_STATUS_CODE`] when no response arrived.
    pub status_code: u16,
    /// Wall-clock time from request start to response or failure.
    pub response_time_ms: Option<i64>,
    pub failure: Option<ProbeFailure>,
}

impl ProbeOutcome {
    /// Outcome for a received HTTP response.
    pub fn from_response(status_code: u16, response_time_ms: i64) -> Self {
        Self {
            status: classify_status_code(status_code),
            status_code,
            response_time_ms: Some(response_time_ms),
            failure: None,
        }
    }

    /// Outcome for a request that produced no response.
    pub fn from_failure(failure: ProbeFailure, response_time_ms: Option<i64>) -> Self {
        Self {
            status: failure.kind.status(),
            status_code: NO_STATUS_CODE,
            response_time_ms,
            failure: Some(failure),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(|f| f.kind == ProbeFailureKind::Timeout)
    }
}

/// Classify an HTTP status code.
///
/// 2xx is `up`, 4xx and 5xx are `down`, everything else (1xx, 3xx, out of
/// range) is `unknown`.
pub fn classify_status_code(code: u16) -> TargetStatus {
    match code {
        200..=299 => TargetStatus::Up,
        400..=599 => TargetStatus::Down,
        _ => TargetStatus::Unknown,
    }
}

/// Prepend `https://` when the URL carries no `http://` or `https://` prefix.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
