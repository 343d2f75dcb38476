//! Persistence port for the portal core. The Diesel adapter is the
//! production implementation; tests run against the in-memory store so the
//! check-then-act invariants can be exercised without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use quad_shared::errors::AppResult;

use crate::models::{
    Follow, NewFollow, NewNotification, NewProfile, Notification, OtpCredential, Profile,
    ProfileDetailsUpdate,
};

mod diesel_store;
#[cfg(test)]
pub mod memory;

pub use diesel_store::DieselStore;

/// Outcome of the gated details write. The gate re-check happens inside the
/// store so the eligibility read and the mutation commit as one unit.
#[derive(Debug)]
pub enum DetailsUpdate {
    Applied(Profile),
    CoolingDown { days_remaining: i64 },
}

/// Outcome of an edge insert. `Duplicate` is the unique-constraint loser in
/// a follow race, not an error at this layer.
#[derive(Debug)]
pub enum FollowInsert {
    Created(Follow),
    Duplicate,
}

#[async_trait]
pub trait PortalStore: Send + Sync {
    // --- profiles ---
    async fn create_profile(&self, profile: NewProfile) -> AppResult<Profile>;
    async fn profile_by_account(&self, account_id: Uuid) -> AppResult<Option<Profile>>;
    async fn profile_by_username(&self, username: &str) -> AppResult<Option<Profile>>;

    /// Applies the change set only if the cooldown gate is open at `now`,
    /// re-checking `last_profile_details_update` under the same row lock
    /// that covers the write.
    async fn apply_profile_details(
        &self,
        account_id: Uuid,
        update: ProfileDetailsUpdate,
        now: DateTime<Utc>,
        cooldown_days: i64,
    ) -> AppResult<DetailsUpdate>;

    async fn set_profile_image(
        &self,
        account_id: Uuid,
        image_url: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Profile>;

    // --- otp credentials ---
    async fn credential_by_account(&self, account_id: Uuid) -> AppResult<Option<OtpCredential>>;
    async fn get_or_create_credential(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<OtpCredential>;
    async fn rotate_credential_secret(
        &self,
        account_id: Uuid,
        secret: &str,
        now: DateTime<Utc>,
    ) -> AppResult<OtpCredential>;
    async fn mark_credential_verified(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    // --- follow graph ---
    async fn insert_follow(&self, follow: NewFollow) -> AppResult<FollowInsert>;
    /// Returns true when an edge existed and was deleted.
    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> AppResult<bool>;
    async fn followers_of(&self, account_id: Uuid) -> AppResult<Vec<Follow>>;
    async fn following_of(&self, account_id: Uuid) -> AppResult<Vec<Follow>>;
    async fn count_followers(&self, account_id: Uuid) -> AppResult<i64>;
    async fn count_following(&self, account_id: Uuid) -> AppResult<i64>;

    // --- notifications ---
    async fn insert_notification(&self, notification: NewNotification) -> AppResult<Notification>;
    async fn notifications_for(
        &self,
        recipient_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Notification>, i64)>;
    async fn count_unread(&self, recipient_id: Uuid) -> AppResult<i64>;
    async fn mark_notification_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> AppResult<Option<Notification>>;
}
