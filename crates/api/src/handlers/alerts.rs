use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TransportStatus {
    pub email_configured: bool,
}

/// POST /alerts/refresh-transport
///
/// Re-read the SMTP settings and swap the email transport in place.
pub async fn refresh_transport(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<TransportStatus>>> {
    let email_configured = state.monitor.refresh_transport().await;
    Ok(Json(DataResponse {
        data: TransportStatus { email_configured },
    }))
}
