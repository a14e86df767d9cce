//! Monitored target model, configuration bounds and the due predicate.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::status::TargetStatus;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default check interval in minutes.
pub const DEFAULT_CHECK_INTERVAL_MINS: i32 = 5;
/// Smallest allowed check interval in minutes.
pub const MIN_CHECK_INTERVAL_MINS: i32 = 1;
/// Largest allowed check interval in minutes.
pub const MAX_CHECK_INTERVAL_MINS: i32 = 60;

/// Default probe timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: i32 = 30;
/// Smallest allowed probe timeout in seconds.
pub const MIN_TIMEOUT_SECS: i32 = 5;
/// Largest allowed probe timeout in seconds.
pub const MAX_TIMEOUT_SECS: i32 = 300;

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Per-target alert channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertSettings {
    pub email_enabled: bool,
    pub webhook_url: Option<String>,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            email_enabled: true,
            webhook_url: None,
        }
    }
}

/// A monitored HTTP endpoint together with its runtime state.
#[derive(Debug, Clone, Serialize)]
pub struct Target {
    pub id: DbId,
    pub name: String,
    pub url: String,
    pub owner_id: DbId,
    pub status: TargetStatus,
    pub last_checked: Option<Timestamp>,
    pub response_time_ms: Option<i64>,
    pub check_interval_mins: i32,
    pub timeout_secs: i32,
    pub alerts: AlertSettings,
    pub is_active: bool,
}

impl Target {
    /// A freshly registered target: `unknown`, never checked.
    pub fn new(id: DbId, name: impl Into<String>, url: impl Into<String>, owner_id: DbId) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            owner_id,
            status: TargetStatus::Unknown,
            last_checked: None,
            response_time_ms: None,
            check_interval_mins: DEFAULT_CHECK_INTERVAL_MINS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            alerts: AlertSettings::default(),
            is_active: true,
        }
    }

    /// Whether the target must be probed at `now`.
    ///
    /// A target that was never checked is measured from the Unix epoch and
    /// is therefore always due.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.is_due_with_grace(now, chrono::Duration::zero())
    }

    /// Like [`Target::is_due`], but a target whose interval elapses within
    /// `grace` after `now` also counts as due.
    pub fn is_due_with_grace(&self, now: Timestamp, grace: chrono::Duration) -> bool {
        let last = self.last_checked.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let elapsed = now.signed_duration_since(last) + grace;
        elapsed >= chrono::Duration::minutes(i64::from(self.check_interval_mins))
    }

    /// Probe timeout clamped into `[min_secs, max_secs]`.
    pub fn probe_timeout(&self, min_secs: u64, max_secs: u64) -> Duration {
        let secs = u64::try_from(self.timeout_secs).unwrap_or(min_secs);
        Duration::from_secs(secs.clamp(min_secs, max_secs.max(min_secs)))
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a check interval in minutes.
///
/// Timeouts need no counterpart: [`Target::probe_timeout`] clamps them.
pub fn validate_check_interval(mins: i32) -> Result<(), CoreError> {
    if !(MIN_CHECK_INTERVAL_MINS..=MAX_CHECK_INTERVAL_MINS).contains(&mins) {
        return Err(CoreError::Validation(format!(
            "Check interval must be between {MIN_CHECK_INTERVAL_MINS} and \
             {MAX_CHECK_INTERVAL_MINS} minutes"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
