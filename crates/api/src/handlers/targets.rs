//! Handlers for the per-target collaborator endpoints.
//!
//! None of these write target state: on-demand checks and test alerts go
//! straight through the [`Monitor`](upwatch_monitor::Monitor) facade, and
//! uptime is read from the check history.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use upwatch_core::alert::{AlertTarget, TEST_ALERT_MESSAGE};
use upwatch_core::error::CoreError;
use upwatch_core::history::uptime_from_counts;
use upwatch_core::probe::ProbeOutcome;
use upwatch_core::target::Target;
use upwatch_core::types::{DbId, Timestamp};
use upwatch_db::models::check_history::{DowntimeIncident, ResponseTimePoint, UptimeSummary};
use upwatch_db::repositories::{CheckHistoryRepo, TargetRepo, UserRepo};
use upwatch_db::DbPool;
use upwatch_events::DispatchResult;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Window used when `?period=` is omitted.
pub const DEFAULT_UPTIME_PERIOD_HOURS: i64 = 24;
/// Longest window accepted by the uptime endpoint (one year).
pub const MAX_UPTIME_PERIOD_HOURS: i64 = 24 * 365;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct UptimeQuery {
    /// Trailing window in hours.
    pub period: Option<i64>,
}

impl UptimeQuery {
    /// The requested window, defaulted and range-checked.
    pub fn period_hours(&self) -> AppResult<i64> {
        let hours = self.period.unwrap_or(DEFAULT_UPTIME_PERIOD_HOURS);
        if !(1..=MAX_UPTIME_PERIOD_HOURS).contains(&hours) {
            return Err(AppError::BadRequest(format!(
                "period must be between 1 and {MAX_UPTIME_PERIOD_HOURS} hours"
            )));
        }
        Ok(hours)
    }
}

/// Result of an on-demand probe.
#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub target_id: DbId,
    pub checked_at: Timestamp,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

/// Uptime summary plus the series behind it.
#[derive(Debug, Serialize)]
pub struct UptimeReport {
    #[serde(flatten)]
    pub summary: UptimeSummary,
    pub response_times: Vec<ResponseTimePoint>,
    pub downtime: Vec<DowntimeIncident>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /targets/{id}/check
///
/// Probe the target now. The outcome is returned but not persisted and no
/// alert is sent.
pub async fn check_now(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<CheckResult>>> {
    let target = load_target(&state.pool, id).await?;
    let checked_at = Utc::now();
    let outcome = state.monitor.probe_now(&target).await;

    tracing::debug!(target_id = id, status = %outcome.status, "On-demand check");
    Ok(Json(DataResponse {
        data: CheckResult {
            target_id: id,
            checked_at,
            outcome,
        },
    }))
}

/// POST /targets/{id}/test-alert
///
/// Send a test alert through every channel configured on the target.
pub async fn send_test_alert(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<DispatchResult>>> {
    let target = load_target(&state.pool, id).await?;
    let owner_email = UserRepo::find_email(&state.pool, target.owner_id).await?;
    let alert_target = AlertTarget::from_target(&target, owner_email);

    let result = state
        .monitor
        .send_test_alert(&alert_target, TEST_ALERT_MESSAGE)
        .await;
    Ok(Json(DataResponse { data: result }))
}

/// GET /targets/{id}/uptime?period=<hours>
pub async fn uptime(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(query): Query<UptimeQuery>,
) -> AppResult<Json<DataResponse<UptimeReport>>> {
    let period_hours = query.period_hours()?;
    // 404 for unknown targets rather than an empty report.
    load_target(&state.pool, id).await?;

    let since = Utc::now() - chrono::Duration::hours(period_hours);
    let counts = CheckHistoryRepo::uptime_since(&state.pool, id, since).await?;
    let response_times = CheckHistoryRepo::response_times_since(&state.pool, id, since).await?;
    let downtime = CheckHistoryRepo::downtime_since(&state.pool, id, since).await?;

    let uptime_percentage = uptime_from_counts(
        u64::try_from(counts.up).unwrap_or_default(),
        u64::try_from(counts.total).unwrap_or_default(),
    );

    Ok(Json(DataResponse {
        data: UptimeReport {
            summary: UptimeSummary {
                target_id: id,
                period_hours,
                total_checks: counts.total,
                up_checks: counts.up,
                uptime_percentage,
            },
            response_times,
            downtime,
        },
    }))
}

async fn load_target(pool: &DbPool, id: DbId) -> AppResult<Target> {
    let row = TargetRepo::find_by_id(pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "target",
            id,
        })?;
    Ok(row.into_target()?)
}
