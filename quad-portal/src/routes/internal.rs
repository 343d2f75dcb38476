//! Service-to-service endpoints. These sit behind the gateway's private
//! network and carry no end-user auth.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use quad_shared::errors::AppResult;
use quad_shared::types::ApiResponse;

use crate::models::{Notification, Profile};
use crate::services::notifications::{self, NotificationRequest};
use crate::services::profile::{self, NewProfileRequest};
use crate::AppState;

// --- POST /internal/profiles ---

/// Called by the identity service once an account is registered.
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewProfileRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let created = profile::create_profile(state.store.as_ref(), req, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(created)))
}

// --- POST /internal/notifications ---

/// Called by the content service when a thread is liked or commented on.
/// Self-actions come back as `data: null` and are not recorded.
pub async fn emit_notification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NotificationRequest>,
) -> AppResult<Json<ApiResponse<Option<Notification>>>> {
    let created = notifications::emit(state.store.as_ref(), req, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(created)))
}
