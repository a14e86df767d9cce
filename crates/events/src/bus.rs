//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] carries the [`StatusUpdate`]s the scheduler publishes after
//! every applied probe result. It is shared via `Arc<EventBus>`.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use upwatch_core::status::TargetStatus;
use upwatch_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// StatusUpdate
// ---------------------------------------------------------------------------

/// Runtime state of one target right after a probe result was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub target_id: DbId,
    pub status: TargetStatus,
    pub response_time_ms: Option<i64>,
    pub last_checked: Timestamp,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus for status updates.
///
/// Delivery is best-effort: slow receivers observe `RecvError::Lagged`
/// and publishing without subscribers drops the update.
///
/// ```rust
/// use upwatch_events::bus::EventBus;
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
/// assert_eq!(bus.subscriber_count(), 1);
/// ```
pub struct EventBus {
    sender: broadcast::Sender<StatusUpdate>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an update to all current subscribers.
    pub fn publish(&self, update: StatusUpdate) {
        // A send error only means there are zero receivers.
        let _ = self.sender.send(update);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
