//! Read-only presence queries

use axum::{
    extract::{Path, State},
    Json,
};
use chatline_shared::{PresenceStatus, UserIdentity};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OnlineUsersResponse {
    pub users: Vec<UserIdentity>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresenceResponse {
    pub user_id: UserIdentity,
    pub status: PresenceStatus,
}

/// List every identity currently reachable
pub async fn list_online(State(state): State<AppState>) -> Json<OnlineUsersResponse> {
    let users = state.ws_state.registry.online_users().await;
    let count = users.len();
    Json(OnlineUsersResponse { users, count })
}

/// Presence of a single identity; 404 when not online
pub async fn get_user_presence(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserPresenceResponse>> {
    if user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user id must not be empty".to_string()));
    }

    let user_id = UserIdentity::new(user_id);
    if !state.ws_state.registry.is_online(&user_id).await {
        return Err(ApiError::UserOffline);
    }

    Ok(Json(UserPresenceResponse {
        user_id,
        status: PresenceStatus::Online,
    }))
}
