//! Check history records and uptime math.

use serde::Serialize;

use crate::probe::ProbeOutcome;
use crate::status::TargetStatus;
use crate::types::{DbId, Timestamp};

/// A check history row to append. The timestamp defaults to insertion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckRecord {
    pub target_id: DbId,
    pub status: TargetStatus,
    pub response_time_ms: Option<i64>,
    pub status_code: u16,
}

impl NewCheckRecord {
    pub fn from_outcome(target_id: DbId, outcome: &ProbeOutcome) -> Self {
        Self {
            target_id,
            status: outcome.status,
            response_time_ms: outcome.response_time_ms,
            status_code: outcome.status_code,
        }
    }
}

/// An immutable, persisted probe result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRecord {
    pub id: DbId,
    pub target_id: DbId,
    pub status: TargetStatus,
    pub status_code: u16,
    pub response_time_ms: Option<i64>,
    pub checked_at: Timestamp,
}

/// Uptime percentage from pre-aggregated counts, `0.0` when `total` is zero.
pub fn uptime_from_counts(up: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    up.min(total) as f64 / total as f64 * 100.0
}
