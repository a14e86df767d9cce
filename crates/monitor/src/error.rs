use upwatch_core::error::StoreError;
use upwatch_core::types::DbId;

/// Failure while applying one target's probe result.
///
/// Scoped to a single target: the scheduler logs it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Failed to append check history for target {target_id}: {source}")]
    History {
        target_id: DbId,
        #[source]
        source: StoreError,
    },

    #[error("Failed to update runtime state for target {target_id}: {source}")]
    TargetUpdate {
        target_id: DbId,
        #[source]
        source: StoreError,
    },

    #[error("Probe worker pool is closed")]
    PoolClosed,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
