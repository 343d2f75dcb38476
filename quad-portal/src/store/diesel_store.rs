use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::PgConnection;
use uuid::Uuid;

use quad_shared::clients::db::DbPool;
use quad_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{
    Follow, NewFollow, NewNotification, NewOtpCredential, NewProfile, Notification, OtpCredential,
    Profile, ProfileDetailsUpdate,
};
use crate::schema::{follows, notifications, otp_credentials, profiles};
use crate::services::profile as profile_gate;

use super::{DetailsUpdate, FollowInsert, PortalStore};

/// Postgres-backed store. All check-then-act sequences rely on row locks
/// and table constraints rather than application-level reads.
#[derive(Clone)]
pub struct DieselStore {
    pool: DbPool,
}

impl DieselStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<PooledConnection<ConnectionManager<PgConnection>>> {
        self.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection");
            AppError::internal("database connection error")
        })
    }
}

fn profile_not_found(e: DieselError) -> AppError {
    match e {
        DieselError::NotFound => AppError::new(ErrorCode::ProfileNotFound, "profile not found"),
        other => AppError::Database(other),
    }
}

#[async_trait]
impl PortalStore for DieselStore {
    async fn create_profile(&self, profile: NewProfile) -> AppResult<Profile> {
        let mut conn = self.conn()?;

        match diesel::insert_into(profiles::table)
            .values(&profile)
            .get_result::<Profile>(&mut conn)
        {
            Ok(created) => Ok(created),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Err(
                AppError::Validation("account, username, or email already registered".into()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn profile_by_account(&self, account_id: Uuid) -> AppResult<Option<Profile>> {
        let mut conn = self.conn()?;

        profiles::table
            .filter(profiles::account_id.eq(account_id))
            .first::<Profile>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    async fn profile_by_username(&self, username: &str) -> AppResult<Option<Profile>> {
        let mut conn = self.conn()?;

        profiles::table
            .filter(profiles::username.eq(username))
            .first::<Profile>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    async fn apply_profile_details(
        &self,
        account_id: Uuid,
        update: ProfileDetailsUpdate,
        now: DateTime<Utc>,
        cooldown_days: i64,
    ) -> AppResult<DetailsUpdate> {
        let mut conn = self.conn()?;

        conn.transaction::<DetailsUpdate, AppError, _>(|conn| {
            let profile: Profile = profiles::table
                .filter(profiles::account_id.eq(account_id))
                .for_update()
                .first(conn)
                .map_err(profile_not_found)?;

            if !profile_gate::can_update_details(
                profile.last_profile_details_update,
                now,
                cooldown_days,
            ) {
                let days_remaining = profile_gate::days_remaining(
                    profile.last_profile_details_update,
                    now,
                    cooldown_days,
                );
                return Ok(DetailsUpdate::CoolingDown { days_remaining });
            }

            let updated = diesel::update(profiles::table.filter(profiles::id.eq(profile.id)))
                .set((
                    &update,
                    profiles::updated_at.eq(now),
                    profiles::last_profile_details_update.eq(Some(now)),
                ))
                .get_result::<Profile>(conn)?;

            Ok(DetailsUpdate::Applied(updated))
        })
    }

    async fn set_profile_image(
        &self,
        account_id: Uuid,
        image_url: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Profile> {
        let mut conn = self.conn()?;

        diesel::update(profiles::table.filter(profiles::account_id.eq(account_id)))
            .set((
                profiles::profile_image_url.eq(Some(image_url)),
                profiles::updated_at.eq(now),
            ))
            .get_result::<Profile>(&mut conn)
            .map_err(profile_not_found)
    }

    async fn credential_by_account(&self, account_id: Uuid) -> AppResult<Option<OtpCredential>> {
        let mut conn = self.conn()?;

        otp_credentials::table
            .filter(otp_credentials::account_id.eq(account_id))
            .first::<OtpCredential>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    async fn get_or_create_credential(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<OtpCredential> {
        let mut conn = self.conn()?;

        let new_credential = NewOtpCredential {
            account_id,
            updated_at: now,
        };

        // Concurrent first-issuance calls race on the unique constraint;
        // the loser's insert is a no-op and both read the same row back.
        diesel::insert_into(otp_credentials::table)
            .values(&new_credential)
            .on_conflict(otp_credentials::account_id)
            .do_nothing()
            .execute(&mut conn)?;

        otp_credentials::table
            .filter(otp_credentials::account_id.eq(account_id))
            .first::<OtpCredential>(&mut conn)
            .map_err(Into::into)
    }

    async fn rotate_credential_secret(
        &self,
        account_id: Uuid,
        secret: &str,
        now: DateTime<Utc>,
    ) -> AppResult<OtpCredential> {
        let mut conn = self.conn()?;

        diesel::update(otp_credentials::table.filter(otp_credentials::account_id.eq(account_id)))
            .set((
                otp_credentials::secret.eq(Some(secret)),
                otp_credentials::is_verified.eq(false),
                otp_credentials::updated_at.eq(now),
            ))
            .get_result::<OtpCredential>(&mut conn)
            .map_err(|e| match e {
                DieselError::NotFound => {
                    AppError::new(ErrorCode::ProfileNotFound, "otp credential not found")
                }
                other => AppError::Database(other),
            })
    }

    async fn mark_credential_verified(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut conn = self.conn()?;

        diesel::update(otp_credentials::table.filter(otp_credentials::account_id.eq(account_id)))
            .set((
                otp_credentials::is_verified.eq(true),
                otp_credentials::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn insert_follow(&self, follow: NewFollow) -> AppResult<FollowInsert> {
        let mut conn = self.conn()?;

        match diesel::insert_into(follows::table)
            .values(&follow)
            .get_result::<Follow>(&mut conn)
        {
            Ok(created) => Ok(FollowInsert::Created(created)),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Ok(FollowInsert::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> AppResult<bool> {
        let mut conn = self.conn()?;

        let deleted = diesel::delete(
            follows::table
                .filter(follows::follower_id.eq(follower_id))
                .filter(follows::following_id.eq(following_id)),
        )
        .execute(&mut conn)?;

        Ok(deleted > 0)
    }

    async fn followers_of(&self, account_id: Uuid) -> AppResult<Vec<Follow>> {
        let mut conn = self.conn()?;

        follows::table
            .filter(follows::following_id.eq(account_id))
            .order(follows::created_at.desc())
            .load::<Follow>(&mut conn)
            .map_err(Into::into)
    }

    async fn following_of(&self, account_id: Uuid) -> AppResult<Vec<Follow>> {
        let mut conn = self.conn()?;

        follows::table
            .filter(follows::follower_id.eq(account_id))
            .order(follows::created_at.desc())
            .load::<Follow>(&mut conn)
            .map_err(Into::into)
    }

    async fn count_followers(&self, account_id: Uuid) -> AppResult<i64> {
        let mut conn = self.conn()?;

        follows::table
            .filter(follows::following_id.eq(account_id))
            .count()
            .get_result(&mut conn)
            .map_err(Into::into)
    }

    async fn count_following(&self, account_id: Uuid) -> AppResult<i64> {
        let mut conn = self.conn()?;

        follows::table
            .filter(follows::follower_id.eq(account_id))
            .count()
            .get_result(&mut conn)
            .map_err(Into::into)
    }

    async fn insert_notification(&self, notification: NewNotification) -> AppResult<Notification> {
        let mut conn = self.conn()?;

        diesel::insert_into(notifications::table)
            .values(&notification)
            .get_result::<Notification>(&mut conn)
            .map_err(Into::into)
    }

    async fn notifications_for(
        &self,
        recipient_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let mut conn = self.conn()?;

        let total: i64 = notifications::table
            .filter(notifications::recipient_id.eq(recipient_id))
            .count()
            .get_result(&mut conn)?;

        let items = notifications::table
            .filter(notifications::recipient_id.eq(recipient_id))
            .order(notifications::created_at.desc())
            .limit(limit)
            .offset(offset)
            .load::<Notification>(&mut conn)?;

        Ok((items, total))
    }

    async fn count_unread(&self, recipient_id: Uuid) -> AppResult<i64> {
        let mut conn = self.conn()?;

        notifications::table
            .filter(notifications::recipient_id.eq(recipient_id))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result(&mut conn)
            .map_err(Into::into)
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> AppResult<Option<Notification>> {
        let mut conn = self.conn()?;

        diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::recipient_id.eq(recipient_id)),
        )
        .set(notifications::is_read.eq(true))
        .get_result::<Notification>(&mut conn)
        .optional()
        .map_err(Into::into)
    }
}
