//! Bridges scheduler status updates onto the WebSocket clients.

use std::sync::Arc;

use axum::extract::ws::Message;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use upwatch_core::status::TargetStatus;
use upwatch_core::types::{DbId, Timestamp};
use upwatch_events::StatusUpdate;

use crate::ws::manager::WsManager;

/// Frames pushed to live-update clients, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveMessage {
    TargetUpdate {
        id: DbId,
        status: TargetStatus,
        response_time_ms: Option<i64>,
        last_checked: Timestamp,
    },
}

impl From<&StatusUpdate> for LiveMessage {
    fn from(update: &StatusUpdate) -> Self {
        Self::TargetUpdate {
            id: update.target_id,
            status: update.status,
            response_time_ms: update.response_time_ms,
            last_checked: update.last_checked,
        }
    }
}

impl LiveMessage {
    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }
}

/// Forward every update from `updates` to all connected clients.
///
/// Runs until `cancel` fires or the bus closes. Having no clients is fine;
/// the update is simply not delivered.
pub fn spawn_status_forwarder(
    mut updates: broadcast::Receiver<StatusUpdate>,
    ws_manager: Arc<WsManager>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let update = tokio::select! {
                _ = cancel.cancelled() => break,
                received = updates.recv() => match received {
                    Ok(update) => update,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Live-update forwarder lagged, updates dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            let message = match LiveMessage::from(&update).to_message() {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!(target_id = update.target_id, error = %e, "Failed to encode live update");
                    continue;
                }
            };
            let delivered = ws_manager.broadcast(message).await;
            tracing::trace!(target_id = update.target_id, delivered, "Live update forwarded");
        }
        tracing::debug!("Live-update forwarder stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn target_update_frame_shape() {
        let update = StatusUpdate {
            target_id: 42,
            status: TargetStatus::Down,
            response_time_ms: Some(87),
            last_checked: chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(LiveMessage::from(&update)).unwrap();
        assert_eq!(json["type"], "target_update");
        assert_eq!(json["id"], 42);
        assert_eq!(json["status"], "down");
        assert_eq!(json["response_time_ms"], 87);
        assert_eq!(json["last_checked"], "2024-03-01T12:00:00Z");
    }

    #[test]
    fn missing_response_time_is_null() {
        let update = StatusUpdate {
            target_id: 1,
            status: TargetStatus::Unknown,
            response_time_ms: None,
            last_checked: chrono::Utc::now(),
        };
        let json = serde_json::to_value(LiveMessage::from(&update)).unwrap();
        assert!(json["response_time_ms"].is_null());
    }
}
