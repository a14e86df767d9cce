pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{alerts, targets};
use crate::state::AppState;

/// Routes mounted under `/api/v1`.
///
/// ```text
/// /targets/{id}/check                   probe now, nothing persisted (POST)
/// /targets/{id}/test-alert              send a test alert (POST)
/// /targets/{id}/uptime                  uptime over ?period=<hours> (GET)
///
/// /alerts/refresh-transport             reload SMTP settings (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/targets", target_routes())
        .route("/alerts/refresh-transport", post(alerts::refresh_transport))
}

fn target_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}/check", post(targets::check_now))
        .route("/{id}/test-alert", post(targets::send_test_alert))
        .route("/{id}/uptime", get(targets::uptime))
}
