//! Repository for the `check_history` table (append-only time-series).

use sqlx::PgPool;
use upwatch_core::history::NewCheckRecord;
use upwatch_core::status::TargetStatus;
use upwatch_core::types::{DbId, Timestamp};

use crate::models::check_history::{
    CheckHistoryRow, DowntimeIncident, ResponseTimePoint, UptimeCounts,
};

/// Column list for `check_history` SELECT queries.
const COLUMNS: &str = "id, target_id, status_id, status_code, response_time_ms, checked_at";

/// Provides append and analytics queries for probe history.
pub struct CheckHistoryRepo;

impl CheckHistoryRepo {
    /// Append one probe result. `checked_at` is set by the database.
    pub async fn insert(
        pool: &PgPool,
        record: &NewCheckRecord,
    ) -> Result<CheckHistoryRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO check_history (target_id, status_id, status_code, response_time_ms) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CheckHistoryRow>(&query)
            .bind(record.target_id)
            .bind(record.status.id())
            .bind(i32::from(record.status_code))
            .bind(record.response_time_ms)
            .fetch_one(pool)
            .await
    }

    /// History for a target since `since`, newest first.
    pub async fn list_since(
        pool: &PgPool,
        target_id: DbId,
        since: Timestamp,
    ) -> Result<Vec<CheckHistoryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM check_history \
             WHERE target_id = $1 AND checked_at >= $2 \
             ORDER BY checked_at DESC, id DESC"
        );
        sqlx::query_as::<_, CheckHistoryRow>(&query)
            .bind(target_id)
            .bind(since)
            .fetch_all(pool)
            .await
    }

    /// Count total and `up` checks since `since`.
    pub async fn uptime_since(
        pool: &PgPool,
        target_id: DbId,
        since: Timestamp,
    ) -> Result<UptimeCounts, sqlx::Error> {
        sqlx::query_as::<_, UptimeCounts>(
            "SELECT COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE status_id = $3) AS up \
             FROM check_history \
             WHERE target_id = $1 AND checked_at >= $2",
        )
        .bind(target_id)
        .bind(since)
        .bind(TargetStatus::Up.id())
        .fetch_one(pool)
        .await
    }

    /// Measured response times since `since`, oldest first.
    pub async fn response_times_since(
        pool: &PgPool,
        target_id: DbId,
        since: Timestamp,
    ) -> Result<Vec<ResponseTimePoint>, sqlx::Error> {
        sqlx::query_as::<_, ResponseTimePoint>(
            "SELECT checked_at, response_time_ms FROM check_history \
             WHERE target_id = $1 AND checked_at >= $2 AND response_time_ms IS NOT NULL \
             ORDER BY checked_at ASC",
        )
        .bind(target_id)
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Checks that recorded `down` since `since`, newest first.
    pub async fn downtime_since(
        pool: &PgPool,
        target_id: DbId,
        since: Timestamp,
    ) -> Result<Vec<DowntimeIncident>, sqlx::Error> {
        sqlx::query_as::<_, DowntimeIncident>(
            "SELECT checked_at, status_code, response_time_ms FROM check_history \
             WHERE target_id = $1 AND checked_at >= $2 AND status_id = $3 \
             ORDER BY checked_at DESC",
        )
        .bind(target_id)
        .bind(since)
        .bind(TargetStatus::Down.id())
        .fetch_all(pool)
        .await
    }
}
