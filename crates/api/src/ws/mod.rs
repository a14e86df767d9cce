//! WebSocket live-update channel.
//!
//! Browser clients connect to `/ws` and receive a `target_update` text frame
//! for every status update the scheduler publishes.

mod forwarder;
mod handler;
mod heartbeat;
pub mod manager;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub use forwarder::{spawn_status_forwarder, LiveMessage};
pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;

/// Mount the live-update endpoint.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}
