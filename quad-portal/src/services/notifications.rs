//! Notification fanout and the recipient-facing feed.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use quad_shared::errors::{AppError, AppResult, ErrorCode};
use quad_shared::types::{Paginated, PaginationParams};

use crate::models::{NewNotification, Notification, NotificationKind};
use crate::store::PortalStore;

#[derive(Debug, Deserialize)]
pub struct NotificationRequest {
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub kind: NotificationKind,
    pub thread_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
}

/// Record a notification. Actions on your own content are dropped rather
/// than rejected, so callers never need to special-case self-interaction.
pub async fn emit(
    store: &dyn PortalStore,
    request: NotificationRequest,
    now: DateTime<Utc>,
) -> AppResult<Option<Notification>> {
    if request.recipient_id == request.actor_id {
        return Ok(None);
    }

    let notification = store
        .insert_notification(NewNotification {
            recipient_id: request.recipient_id,
            actor_id: request.actor_id,
            kind: request.kind.to_string(),
            thread_id: request.thread_id,
            comment_id: request.comment_id,
            created_at: now,
        })
        .await?;

    Ok(Some(notification))
}

/// Best-effort variant for fanout alongside a committed write: a storage
/// failure here is logged and swallowed so it cannot undo the main action.
pub async fn emit_best_effort(
    store: &dyn PortalStore,
    request: NotificationRequest,
    now: DateTime<Utc>,
) {
    let recipient_id = request.recipient_id;
    let kind = request.kind;
    if let Err(e) = emit(store, request, now).await {
        tracing::warn!(
            recipient_id = %recipient_id,
            kind = %kind,
            error = %e,
            "failed to record notification"
        );
    }
}

pub async fn list(
    store: &dyn PortalStore,
    recipient_id: Uuid,
    params: &PaginationParams,
) -> AppResult<Paginated<Notification>> {
    let (items, total) = store
        .notifications_for(recipient_id, params.limit() as i64, params.offset() as i64)
        .await?;
    Ok(Paginated::new(items, total as u64, params))
}

pub async fn unread_count(store: &dyn PortalStore, recipient_id: Uuid) -> AppResult<i64> {
    store.count_unread(recipient_id).await
}

/// Mark one of the recipient's notifications as read. Another account's
/// notification is indistinguishable from a missing one.
pub async fn mark_read(
    store: &dyn PortalStore,
    id: Uuid,
    recipient_id: Uuid,
) -> AppResult<Notification> {
    store
        .mark_notification_read(id, recipient_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::NotificationNotFound, "notification not found"))
}
