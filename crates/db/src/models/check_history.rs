//! Check history rows and the aggregates derived from them.

use serde::Serialize;
use sqlx::FromRow;
use upwatch_core::error::CoreError;
use upwatch_core::history::CheckRecord;
use upwatch_core::status::{StatusId, TargetStatus};
use upwatch_core::types::{DbId, Timestamp};

/// A row from the `check_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CheckHistoryRow {
    pub id: DbId,
    pub target_id: DbId,
    pub status_id: StatusId,
    pub status_code: i32,
    pub response_time_ms: Option<i64>,
    pub checked_at: Timestamp,
}

impl CheckHistoryRow {
    pub fn into_record(self) -> Result<CheckRecord, CoreError> {
        Ok(CheckRecord {
            id: self.id,
            target_id: self.target_id,
            status: TargetStatus::from_id(self.status_id)?,
            status_code: u16::try_from(self.status_code).unwrap_or_default(),
            response_time_ms: self.response_time_ms,
            checked_at: self.checked_at,
        })
    }
}

/// One point of the response-time series.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ResponseTimePoint {
    pub checked_at: Timestamp,
    pub response_time_ms: i64,
}

/// A check that recorded the target as `down`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DowntimeIncident {
    pub checked_at: Timestamp,
    pub status_code: i32,
    pub response_time_ms: Option<i64>,
}

/// Raw counters behind an uptime percentage.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct UptimeCounts {
    pub total: i64,
    pub up: i64,
}

/// Uptime over a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct UptimeSummary {
    pub target_id: DbId,
    pub period_hours: i64,
    pub total_checks: i64,
    pub up_checks: i64,
    pub uptime_percentage: f64,
}
