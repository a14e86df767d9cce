//! Target entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use upwatch_core::error::CoreError;
use upwatch_core::status::{StatusId, TargetStatus};
use upwatch_core::target::{
    validate_check_interval, AlertSettings, Target, DEFAULT_CHECK_INTERVAL_MINS, DEFAULT_TIMEOUT_SECS,
    MAX_CHECK_INTERVAL_MINS, MAX_TIMEOUT_SECS, MIN_CHECK_INTERVAL_MINS, MIN_TIMEOUT_SECS,
};
use upwatch_core::types::{DbId, Timestamp};
use validator::Validate;

/// A row from the `targets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TargetRow {
    pub id: DbId,
    pub name: String,
    pub url: String,
    pub owner_id: DbId,
    pub status_id: StatusId,
    pub last_checked_at: Option<Timestamp>,
    pub response_time_ms: Option<i64>,
    pub check_interval_mins: i32,
    pub timeout_secs: i32,
    pub email_alerts_enabled: bool,
    pub webhook_url: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TargetRow {
    /// Convert into the domain model, resolving the status lookup id.
    ///
    /// Rows whose interval is outside the allowed range are rejected so the
    /// scheduler never probes a target every tick by accident.
    pub fn into_target(self) -> Result<Target, CoreError> {
        validate_check_interval(self.check_interval_mins)?;
        Ok(Target {
            id: self.id,
            name: self.name,
            url: self.url,
            owner_id: self.owner_id,
            status: TargetStatus::from_id(self.status_id)?,
            last_checked: self.last_checked_at,
            response_time_ms: self.response_time_ms,
            check_interval_mins: self.check_interval_mins,
            timeout_secs: self.timeout_secs,
            alerts: AlertSettings {
                email_enabled: self.email_alerts_enabled,
                webhook_url: self.webhook_url,
            },
            is_active: self.is_active,
        })
    }
}

/// DTO for registering a new target. Runtime fields always start empty.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTarget {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    #[validate(range(min = MIN_CHECK_INTERVAL_MINS, max = MAX_CHECK_INTERVAL_MINS))]
    pub check_interval_mins: Option<i32>,
    #[validate(range(min = MIN_TIMEOUT_SECS, max = MAX_TIMEOUT_SECS))]
    pub timeout_secs: Option<i32>,
    pub email_alerts_enabled: Option<bool>,
    #[validate(url)]
    pub webhook_url: Option<String>,
}

impl CreateTarget {
    pub fn check_interval_or_default(&self) -> i32 {
        self.check_interval_mins.unwrap_or(DEFAULT_CHECK_INTERVAL_MINS)
    }

    pub fn timeout_or_default(&self) -> i32 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

/// DTO for updating a target's configuration.
///
/// Only these fields are writable; status, last-checked time and response
/// time belong to the scheduler and are not representable here.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateTarget {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub url: Option<String>,
    #[validate(range(min = MIN_CHECK_INTERVAL_MINS, max = MAX_CHECK_INTERVAL_MINS))]
    pub check_interval_mins: Option<i32>,
    #[validate(range(min = MIN_TIMEOUT_SECS, max = MAX_TIMEOUT_SECS))]
    pub timeout_secs: Option<i32>,
    pub email_alerts_enabled: Option<bool>,
    #[validate(url)]
    pub webhook_url: Option<String>,
    pub is_active: Option<bool>,
}
