//! PostgreSQL implementation of the monitoring repository contracts.

use async_trait::async_trait;
use sqlx::PgPool;
use upwatch_core::error::StoreError;
use upwatch_core::history::NewCheckRecord;
use upwatch_core::repository::{HistorySink, OwnerDirectory, RuntimeState, TargetStore};
use upwatch_core::target::Target;
use upwatch_core::types::DbId;

use crate::repositories::{CheckHistoryRepo, TargetRepo, UserRepo};

/// Adapter exposing the repositories through the core's storage traits.
#[derive(Clone)]
pub struct PgMonitorStore {
    pool: PgPool,
}

impl PgMonitorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TargetStore for PgMonitorStore {
    async fn find_active_targets(&self) -> Result<Vec<Target>, StoreError> {
        let rows = TargetRepo::list_active(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        let mut targets = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.into_target() {
                Ok(target) => targets.push(target),
                Err(e) => {
                    tracing::warn!(target_id = id, error = %e, "Skipping target with invalid row");
                }
            }
        }
        Ok(targets)
    }

    async fn update_runtime_state(&self, id: DbId, state: RuntimeState) -> Result<(), StoreError> {
        let updated = TargetRepo::update_runtime_state(
            &self.pool,
            id,
            state.status,
            state.last_checked,
            state.response_time_ms,
        )
        .await
        .map_err(StoreError::backend)?;

        if !updated {
            return Err(StoreError::NotFound {
                entity: "target",
                id,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HistorySink for PgMonitorStore {
    async fn append_history(&self, record: &NewCheckRecord) -> Result<(), StoreError> {
        CheckHistoryRepo::insert(&self.pool, record)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }
}

#[async_trait]
impl OwnerDirectory for PgMonitorStore {
    async fn resolve_owner_email(&self, target: &Target) -> Result<Option<String>, StoreError> {
        UserRepo::find_email(&self.pool, target.owner_id)
            .await
            .map_err(StoreError::backend)
    }
}
