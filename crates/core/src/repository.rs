//! Repository contracts consumed by the monitoring core.
//!
//! The scheduler only sees these traits; `upwatch-db` provides the
//! PostgreSQL implementation and tests provide in-memory fakes.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::history::NewCheckRecord;
use crate::status::TargetStatus;
use crate::target::Target;
use crate::types::{DbId, Timestamp};

/// Runtime fields the scheduler writes after every probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeState {
    pub status: TargetStatus,
    pub last_checked: Timestamp,
    pub response_time_ms: Option<i64>,
}

/// Read active targets and persist their runtime state.
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn find_active_targets(&self) -> Result<Vec<Target>, StoreError>;

    /// Persist status, last-checked time and response time.
    ///
    /// Implementations must never move `last_checked` backwards.
    async fn update_runtime_state(&self, id: DbId, state: RuntimeState) -> Result<(), StoreError>;
}

/// Append-only sink for probe results.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append_history(&self, record: &NewCheckRecord) -> Result<(), StoreError>;
}

/// Resolve contact details for a target's owner.
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    async fn resolve_owner_email(&self, target: &Target) -> Result<Option<String>, StoreError>;
}
