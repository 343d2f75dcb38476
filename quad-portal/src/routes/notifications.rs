use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use quad_shared::errors::AppResult;
use quad_shared::types::auth::AuthUser;
use quad_shared::types::{ApiResponse, Paginated, PaginationParams};

use crate::models::Notification;
use crate::services::notifications;
use crate::AppState;

// --- GET /notifications ---

pub async fn list(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Notification>>>> {
    let page = notifications::list(state.store.as_ref(), user.id, &params).await?;
    Ok(Json(ApiResponse::ok(page)))
}

// --- GET /notifications/unread-count ---

pub async fn unread_count(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let unread = notifications::unread_count(state.store.as_ref(), user.id).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "unread": unread }))))
}

// --- POST /notifications/:id/read ---

pub async fn mark_read(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let notification = notifications::mark_read(state.store.as_ref(), id, user.id).await?;
    Ok(Json(ApiResponse::ok(notification)))
}
