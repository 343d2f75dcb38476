use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use quad_shared::errors::AppResult;
use quad_shared::types::auth::AuthUser;
use quad_shared::types::ApiResponse;

use crate::models::Follow;
use crate::services::follows::{self, FollowList};
use crate::AppState;

/// Follow mutation outcome: the edge (when one now exists) plus both
/// counters as read after the change.
#[derive(Debug, Serialize)]
pub struct FollowChangeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<Follow>,
    pub target_followers: i64,
    pub your_following: i64,
}

// --- POST /follows/:username ---

pub async fn create_follow(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> AppResult<Json<ApiResponse<FollowChangeResponse>>> {
    let edge = follows::follow(state.store.as_ref(), user.id, &username, Utc::now()).await?;
    let target_followers = state.store.count_followers(edge.following_id).await?;
    let your_following = state.store.count_following(user.id).await?;

    Ok(Json(ApiResponse::ok_with_message(
        FollowChangeResponse {
            edge: Some(edge),
            target_followers,
            your_following,
        },
        format!("now following {username}"),
    )))
}

// --- DELETE /follows/:username ---

pub async fn remove_follow(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> AppResult<Json<ApiResponse<FollowChangeResponse>>> {
    let target = follows::unfollow(state.store.as_ref(), user.id, &username).await?;
    let target_followers = state.store.count_followers(target).await?;
    let your_following = state.store.count_following(user.id).await?;

    Ok(Json(ApiResponse::ok_with_message(
        FollowChangeResponse {
            edge: None,
            target_followers,
            your_following,
        },
        format!("no longer following {username}"),
    )))
}

// --- GET /followers/:username ---

pub async fn list_followers(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> AppResult<Json<ApiResponse<FollowList>>> {
    let list = follows::followers(state.store.as_ref(), &username).await?;
    Ok(Json(ApiResponse::ok(list)))
}

// --- GET /following/:username ---

pub async fn list_following(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> AppResult<Json<ApiResponse<FollowList>>> {
    let list = follows::following(state.store.as_ref(), &username).await?;
    Ok(Json(ApiResponse::ok(list)))
}
