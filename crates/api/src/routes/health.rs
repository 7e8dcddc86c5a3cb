//! Health check endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_connections: usize,
    pub online_users: usize,
}

/// Plain-text banner at `/`
pub async fn root() -> &'static str {
    "Server is running"
}

/// Health check endpoint
///
/// All state is in memory, so the process being able to answer is the check.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let stats = state.ws_state.get_stats().await;

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_connections: stats.active_connections,
            online_users: stats.online_users,
        }),
    )
}

/// Liveness probe (just returns 200 if the server is running)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe
///
/// No external dependency gates traffic; the presence webhook is best effort.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}
