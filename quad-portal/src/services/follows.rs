//! Follow graph operations. Edge invariants (one edge per ordered pair, no
//! self-follow) are enforced by the store's constraints; this layer maps
//! outcomes to API errors and fans out the follow notification.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use quad_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Follow, NewFollow, NotificationKind, Profile};
use crate::services::notifications::{self, NotificationRequest};
use crate::store::{FollowInsert, PortalStore};

/// One account in a followers/following listing.
#[derive(Debug, Serialize)]
pub struct FollowSummary {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_image_url: Option<String>,
    pub followed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FollowList {
    pub total: i64,
    pub accounts: Vec<FollowSummary>,
}

async fn resolve(store: &dyn PortalStore, username: &str) -> AppResult<Profile> {
    store
        .profile_by_username(username)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))
}

/// Create a follow edge from `follower` to the account behind
/// `target_username`, then record a notification for the target.
///
/// The duplicate check is the store's unique constraint, so two racing
/// follow calls resolve to one created edge and one `FollowAlreadyExists`.
pub async fn follow(
    store: &dyn PortalStore,
    follower: Uuid,
    target_username: &str,
    now: DateTime<Utc>,
) -> AppResult<Follow> {
    let target = resolve(store, target_username).await?;
    if target.account_id == follower {
        return Err(AppError::new(
            ErrorCode::CannotFollowSelf,
            "cannot follow your own account",
        ));
    }

    let edge = match store
        .insert_follow(NewFollow {
            follower_id: follower,
            following_id: target.account_id,
            created_at: now,
        })
        .await?
    {
        FollowInsert::Created(edge) => edge,
        FollowInsert::Duplicate => {
            return Err(AppError::new(
                ErrorCode::FollowAlreadyExists,
                format!("already following {target_username}"),
            ))
        }
    };

    // The edge is committed; a notification failure must not undo it.
    notifications::emit_best_effort(
        store,
        NotificationRequest {
            recipient_id: target.account_id,
            actor_id: follower,
            kind: NotificationKind::Follow,
            thread_id: None,
            comment_id: None,
        },
        now,
    )
    .await;

    tracing::info!(follower = %follower, target = %target.account_id, "follow created");
    Ok(edge)
}

/// Remove the edge, returning the target's account id so callers can read
/// back the counters.
pub async fn unfollow(
    store: &dyn PortalStore,
    follower: Uuid,
    target_username: &str,
) -> AppResult<Uuid> {
    let target = resolve(store, target_username).await?;

    if !store.delete_follow(follower, target.account_id).await? {
        return Err(AppError::new(
            ErrorCode::FollowNotFound,
            format!("not following {target_username}"),
        ));
    }

    tracing::info!(follower = %follower, target = %target.account_id, "follow removed");
    Ok(target.account_id)
}

/// Accounts following `username`, newest edge first.
pub async fn followers(store: &dyn PortalStore, username: &str) -> AppResult<FollowList> {
    let profile = resolve(store, username).await?;
    let edges = store.followers_of(profile.account_id).await?;
    let total = store.count_followers(profile.account_id).await?;

    let mut accounts = Vec::with_capacity(edges.len());
    for edge in edges {
        if let Some(p) = store.profile_by_account(edge.follower_id).await? {
            accounts.push(summary(p, edge.created_at));
        }
    }
    Ok(FollowList { total, accounts })
}

/// Accounts that `username` follows, newest edge first.
pub async fn following(store: &dyn PortalStore, username: &str) -> AppResult<FollowList> {
    let profile = resolve(store, username).await?;
    let edges = store.following_of(profile.account_id).await?;
    let total = store.count_following(profile.account_id).await?;

    let mut accounts = Vec::with_capacity(edges.len());
    for edge in edges {
        if let Some(p) = store.profile_by_account(edge.following_id).await? {
            accounts.push(summary(p, edge.created_at));
        }
    }
    Ok(FollowList { total, accounts })
}

fn summary(profile: Profile, followed_at: DateTime<Utc>) -> FollowSummary {
    FollowSummary {
        username: profile.username,
        first_name: profile.first_name,
        last_name: profile.last_name,
        profile_image_url: profile.profile_image_url,
        followed_at,
    }
}
