//! Monitoring configuration loaded from environment variables.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use upwatch_core::probe::DEFAULT_PROBE_USER_AGENT;
use upwatch_core::target::{MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS};
use upwatch_events::delivery::webhook::DEFAULT_WEBHOOK_TIMEOUT;

const DEFAULT_TICK_SECS: u64 = 60;
const DEFAULT_MAX_CONCURRENT_PROBES: usize = 32;

/// Slack applied to the due predicate so timer jitter does not push a
/// target to the following tick.
pub const DUE_GRACE: Duration = Duration::from_secs(2);

/// Process-wide monitoring settings.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Period of the scheduler loop.
    pub tick_interval: Duration,
    /// Upper bound on probes running at the same time.
    pub max_concurrent_probes: usize,
    /// Per-target timeouts are clamped into `[min, max]` seconds.
    pub probe_timeout_min_secs: u64,
    pub probe_timeout_max_secs: u64,
    /// `User-Agent` header sent with every probe.
    pub user_agent: String,
    pub webhook_timeout: Duration,
    pub due_grace: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(DEFAULT_TICK_SECS),
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
            probe_timeout_min_secs: MIN_TIMEOUT_SECS as u64,
            probe_timeout_max_secs: MAX_TIMEOUT_SECS as u64,
            user_agent: DEFAULT_PROBE_USER_AGENT.to_string(),
            webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT,
            due_grace: DUE_GRACE,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default               |
    /// |---------------------------------|-----------------------|
    /// | `MONITOR_TICK_SECS`             | `60`                  |
    /// | `MONITOR_MAX_CONCURRENT_PROBES` | `32`                  |
    /// | `PROBE_TIMEOUT_MIN_SECS`        | `5`                   |
    /// | `PROBE_TIMEOUT_MAX_SECS`        | `300`                 |
    /// | `PROBE_USER_AGENT`              | `Upwatch-Monitor/1.0` |
    /// | `WEBHOOK_TIMEOUT_SECS`          | `10`                  |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MonitorConfig::from_env`] with an arbitrary variable source.
    ///
    /// Invalid or zero values fall back to the default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let tick_secs = positive(&lookup, "MONITOR_TICK_SECS", DEFAULT_TICK_SECS);
        let max_concurrent_probes = positive(
            &lookup,
            "MONITOR_MAX_CONCURRENT_PROBES",
            DEFAULT_MAX_CONCURRENT_PROBES,
        );
        let mut min_secs = positive(
            &lookup,
            "PROBE_TIMEOUT_MIN_SECS",
            defaults.probe_timeout_min_secs,
        );
        let mut max_secs = positive(
            &lookup,
            "PROBE_TIMEOUT_MAX_SECS",
            defaults.probe_timeout_max_secs,
        );
        if min_secs > max_secs {
            tracing::warn!(min_secs, max_secs, "Probe timeout bounds inverted, swapping");
            std::mem::swap(&mut min_secs, &mut max_secs);
        }
        let webhook_secs = positive(
            &lookup,
            "WEBHOOK_TIMEOUT_SECS",
            DEFAULT_WEBHOOK_TIMEOUT.as_secs(),
        );
        let user_agent = lookup("PROBE_USER_AGENT")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.user_agent);

        Self {
            tick_interval: Duration::from_secs(tick_secs),
            max_concurrent_probes,
            probe_timeout_min_secs: min_secs,
            probe_timeout_max_secs: max_secs,
            user_agent,
            webhook_timeout: Duration::from_secs(webhook_secs),
            due_grace: DUE_GRACE,
        }
    }
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + Display + Copy,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => v,
        _ => {
            tracing::warn!(key, value = %raw, default = %default, "Invalid value, using default");
            default
        }
    }
}
