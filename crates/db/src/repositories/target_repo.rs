//! Repository for the `targets` table.

use sqlx::PgPool;
use upwatch_core::status::TargetStatus;
use upwatch_core::types::{DbId, Timestamp};

use crate::models::target::{CreateTarget, TargetRow, UpdateTarget};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, name, url, owner_id, status_id, last_checked_at, response_time_ms, \
    check_interval_mins, timeout_secs, email_alerts_enabled, webhook_url, \
    is_active, created_at, updated_at";

/// Provides queries for monitored targets.
pub struct TargetRepo;

impl TargetRepo {
    /// Register a new target for `owner_id`.
    ///
    /// The row starts `unknown` and never checked; the table defaults own
    /// those columns.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateTarget,
    ) -> Result<TargetRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO targets \
                (name, url, owner_id, check_interval_mins, timeout_secs, \
                 email_alerts_enabled, webhook_url) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, true), $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TargetRow>(&query)
            .bind(&input.name)
            .bind(&input.url)
            .bind(owner_id)
            .bind(input.check_interval_or_default())
            .bind(input.timeout_or_default())
            .bind(input.email_alerts_enabled)
            .bind(&input.webhook_url)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<TargetRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM targets WHERE id = $1");
        sqlx::query_as::<_, TargetRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All targets the scheduler should consider, oldest check first.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<TargetRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM targets \
             WHERE is_active = true \
             ORDER BY last_checked_at ASC NULLS FIRST, id ASC"
        );
        sqlx::query_as::<_, TargetRow>(&query).fetch_all(pool).await
    }

    /// Apply a whitelisted configuration update. Only non-`None` fields change.
    pub async fn update_config(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTarget,
    ) -> Result<Option<TargetRow>, sqlx::Error> {
        let query = format!(
            "UPDATE targets SET \
                name = COALESCE($2, name), \
                url = COALESCE($3, url), \
                check_interval_mins = COALESCE($4, check_interval_mins), \
                timeout_secs = COALESCE($5, timeout_secs), \
                email_alerts_enabled = COALESCE($6, email_alerts_enabled), \
                webhook_url = COALESCE($7, webhook_url), \
                is_active = COALESCE($8, is_active), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TargetRow>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.url)
            .bind(input.check_interval_mins)
            .bind(input.timeout_secs)
            .bind(input.email_alerts_enabled)
            .bind(&input.webhook_url)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Persist the scheduler-owned runtime fields.
    ///
    /// `last_checked_at` never moves backwards: an older write keeps the
    /// stored timestamp. Returns `false` when the target does not exist.
    pub async fn update_runtime_state(
        pool: &PgPool,
        id: DbId,
        status: TargetStatus,
        last_checked: Timestamp,
        response_time_ms: Option<i64>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE targets SET \
                status_id = $2, \
                last_checked_at = GREATEST(last_checked_at, $3), \
                response_time_ms = $4, \
                updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.id())
        .bind(last_checked)
        .bind(response_time_ms)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
