use std::sync::Arc;

use upwatch_monitor::Monitor;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind an `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: upwatch_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Browser clients receiving live target updates.
    pub ws_manager: Arc<WsManager>,
    /// On-demand probes, test alerts and transport refresh.
    pub monitor: Arc<Monitor>,
}
