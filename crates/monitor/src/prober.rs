//! HTTP prober.
//!
//! [`Prober::probe`] never fails: transport errors are folded into the
//! returned [`ProbeOutcome`] as a [`ProbeFailure`].

use std::error::Error as StdError;
use std::io::ErrorKind;
use std::time::{Duration, Instant};

use upwatch_core::probe::{normalize_url, ProbeFailure, ProbeFailureKind, ProbeOutcome};

use crate::error::MonitorError;

/// Issues one GET request per probe through a shared connection pool.
#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    /// Build a prober sending `user_agent` on every request.
    ///
    /// Redirects are followed up to reqwest's default limit of 10.
    pub fn new(user_agent: &str) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    /// Probe `raw_url`, giving up after `timeout`.
    pub async fn probe(&self, raw_url: &str, timeout: Duration) -> ProbeOutcome {
        let url = normalize_url(raw_url);
        let parsed = match reqwest::Url::parse(&url) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ProbeOutcome::from_failure(
                    ProbeFailure::new(ProbeFailureKind::InvalidUrl, e.to_string()),
                    None,
                );
            }
        };

        let started = Instant::now();
        let result = self.client.get(parsed).timeout(timeout).send().await;
        let elapsed_ms = elapsed_millis(started);

        match result {
            Ok(response) => ProbeOutcome::from_response(response.status().as_u16(), elapsed_ms),
            Err(e) => {
                let kind = classify_error(&e);
                let timing = (kind != ProbeFailureKind::InvalidUrl).then_some(elapsed_ms);
                ProbeOutcome::from_failure(ProbeFailure::new(kind, error_chain(&e)), timing)
            }
        }
    }
}

fn elapsed_millis(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

/// Map a reqwest error to a failure class.
///
/// reqwest does not expose DNS or TLS failures as distinct kinds, so those
/// are recognised from the error's sources. The top-level message carries
/// the request URL and is never inspected.
pub fn classify_error(err: &reqwest::Error) -> ProbeFailureKind {
    if err.is_timeout() {
        return ProbeFailureKind::Timeout;
    }
    if err.is_redirect() {
        return ProbeFailureKind::Redirect;
    }
    if err.is_builder() {
        return ProbeFailureKind::InvalidUrl;
    }
    classify_causes(err.source(), err.is_connect())
}

fn classify_causes(
    mut source: Option<&(dyn StdError + 'static)>,
    is_connect: bool,
) -> ProbeFailureKind {
    let mut text = String::new();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                ErrorKind::ConnectionRefused => return ProbeFailureKind::Connect,
                ErrorKind::TimedOut => return ProbeFailureKind::Timeout,
                _ => {}
            }
        }
        text.push_str(&cause.to_string().to_ascii_lowercase());
        text.push('\n');
        source = cause.source();
    }

    if text.contains("dns") || text.contains("failed to lookup") || text.contains("resolve") {
        ProbeFailureKind::Dns
    } else if text.contains("certificate")
        || text.contains("tls")
        || text.contains("ssl")
        || text.contains("handshake")
    {
        ProbeFailureKind::Tls
    } else if is_connect {
        ProbeFailureKind::Connect
    } else {
        ProbeFailureKind::Request
    }
}

/// The error message followed by every source, joined with `": "`.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let msg = cause.to_string();
        if !text.contains(&msg) {
            text.push_str(": ");
            text.push_str(&msg);
        }
        source = cause.source();
    }
    text
}
