use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use quad_shared::errors::AppResult;
use quad_shared::types::auth::AuthUser;
use quad_shared::types::ApiResponse;

use crate::models::Profile;
use crate::services::profile::{self, ProfileDetailsRequest, ProfileImageRequest};
use crate::AppState;

// --- GET /me ---

pub async fn get_me(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let found = profile::get_by_account(state.store.as_ref(), user.id).await?;
    Ok(Json(ApiResponse::ok(found)))
}

// --- PATCH /me/details ---

pub async fn update_details(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProfileDetailsRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let updated = profile::update_details(
        state.store.as_ref(),
        user.id,
        req,
        Utc::now(),
        state.config.cooldown_days,
    )
    .await?;

    Ok(Json(ApiResponse::ok_with_message(
        updated,
        "profile details updated",
    )))
}

// --- PATCH /me/image ---

pub async fn update_image(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProfileImageRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let updated = profile::update_image(state.store.as_ref(), user.id, req, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(updated)))
}
