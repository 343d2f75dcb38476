//! In-memory `PortalStore` used by the service tests. A single mutex plays
//! the role of the database's row locks: every check-then-act sequence runs
//! under one lock acquisition, matching the atomicity the Diesel adapter
//! gets from transactions and constraints.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use quad_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{
    Follow, NewFollow, NewNotification, NewProfile, Notification, OtpCredential, Profile,
    ProfileDetailsUpdate,
};
use crate::services::profile as profile_gate;

use super::{DetailsUpdate, FollowInsert, PortalStore};

#[derive(Default)]
struct Inner {
    profiles: Vec<Profile>,
    credentials: Vec<OtpCredential>,
    follows: Vec<Follow>,
    notifications: Vec<Notification>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_notifications: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent notification insert fail, to exercise the
    /// best-effort fanout path.
    pub fn fail_notifications(&self) {
        self.fail_notifications.store(true, Ordering::SeqCst);
    }

    pub fn notification_count(&self) -> usize {
        self.inner.lock().expect("store lock").notifications.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.lock().expect("store lock").follows.len()
    }

    /// Seed a profile directly, bypassing validation.
    pub fn seed_profile(&self, account_id: Uuid, username: &str, now: DateTime<Utc>) -> Profile {
        let profile = Profile {
            id: Uuid::new_v4(),
            account_id,
            username: username.to_string(),
            email: format!("{username}@campus.test"),
            first_name: username.to_string(),
            last_name: "Test".to_string(),
            birth_date: chrono::NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date"),
            gender: "male".to_string(),
            role: "student".to_string(),
            department: "ccis".to_string(),
            course: "bscs".to_string(),
            profile_image_url: None,
            created_at: now,
            updated_at: now,
            last_profile_details_update: None,
        };
        self.inner
            .lock()
            .expect("store lock")
            .profiles
            .push(profile.clone());
        profile
    }
}

fn lock_poisoned() -> AppError {
    AppError::internal("store lock poisoned")
}

#[async_trait]
impl PortalStore for MemoryStore {
    async fn create_profile(&self, profile: NewProfile) -> AppResult<Profile> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        let duplicate = inner.profiles.iter().any(|p| {
            p.account_id == profile.account_id
                || p.username == profile.username
                || p.email == profile.email
        });
        if duplicate {
            return Err(AppError::Validation(
                "account, username, or email already registered".into(),
            ));
        }

        let created = Profile {
            id: Uuid::new_v4(),
            account_id: profile.account_id,
            username: profile.username,
            email: profile.email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            birth_date: profile.birth_date,
            gender: profile.gender,
            role: profile.role,
            department: profile.department,
            course: profile.course,
            profile_image_url: None,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
            last_profile_details_update: None,
        };
        inner.profiles.push(created.clone());
        Ok(created)
    }

    async fn profile_by_account(&self, account_id: Uuid) -> AppResult<Option<Profile>> {
        let inner = self.inner.lock().map_err(|_| lock_poisoned())?;
        Ok(inner
            .profiles
            .iter()
            .find(|p| p.account_id == account_id)
            .cloned())
    }

    async fn profile_by_username(&self, username: &str) -> AppResult<Option<Profile>> {
        let inner = self.inner.lock().map_err(|_| lock_poisoned())?;
        Ok(inner
            .profiles
            .iter()
            .find(|p| p.username == username)
            .cloned())
    }

    async fn apply_profile_details(
        &self,
        account_id: Uuid,
        update: ProfileDetailsUpdate,
        now: DateTime<Utc>,
        cooldown_days: i64,
    ) -> AppResult<DetailsUpdate> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        let profile = inner
            .profiles
            .iter_mut()
            .find(|p| p.account_id == account_id)
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

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

        if let Some(first_name) = update.first_name {
            profile.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            profile.last_name = last_name;
        }
        if let Some(birth_date) = update.birth_date {
            profile.birth_date = birth_date;
        }
        if let Some(gender) = update.gender {
            profile.gender = gender;
        }
        if let Some(role) = update.role {
            profile.role = role;
        }
        if let Some(department) = update.department {
            profile.department = department;
        }
        if let Some(course) = update.course {
            profile.course = course;
        }
        profile.updated_at = now;
        profile.last_profile_details_update = Some(now);

        Ok(DetailsUpdate::Applied(profile.clone()))
    }

    async fn set_profile_image(
        &self,
        account_id: Uuid,
        image_url: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Profile> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        let profile = inner
            .profiles
            .iter_mut()
            .find(|p| p.account_id == account_id)
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

        profile.profile_image_url = Some(image_url.to_string());
        profile.updated_at = now;
        Ok(profile.clone())
    }

    async fn credential_by_account(&self, account_id: Uuid) -> AppResult<Option<OtpCredential>> {
        let inner = self.inner.lock().map_err(|_| lock_poisoned())?;
        Ok(inner
            .credentials
            .iter()
            .find(|c| c.account_id == account_id)
            .cloned())
    }

    async fn get_or_create_credential(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<OtpCredential> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        if let Some(existing) = inner
            .credentials
            .iter()
            .find(|c| c.account_id == account_id)
        {
            return Ok(existing.clone());
        }

        let credential = OtpCredential {
            id: Uuid::new_v4(),
            account_id,
            secret: None,
            is_verified: false,
            updated_at: now,
        };
        inner.credentials.push(credential.clone());
        Ok(credential)
    }

    async fn rotate_credential_secret(
        &self,
        account_id: Uuid,
        secret: &str,
        now: DateTime<Utc>,
    ) -> AppResult<OtpCredential> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        let credential = inner
            .credentials
            .iter_mut()
            .find(|c| c.account_id == account_id)
            .ok_or_else(|| {
                AppError::new(ErrorCode::ProfileNotFound, "otp credential not found")
            })?;

        credential.secret = Some(secret.to_string());
        credential.is_verified = false;
        credential.updated_at = now;
        Ok(credential.clone())
    }

    async fn mark_credential_verified(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        if let Some(credential) = inner
            .credentials
            .iter_mut()
            .find(|c| c.account_id == account_id)
        {
            credential.is_verified = true;
            credential.updated_at = now;
        }
        Ok(())
    }

    async fn insert_follow(&self, follow: NewFollow) -> AppResult<FollowInsert> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        let exists = inner
            .follows
            .iter()
            .any(|f| f.follower_id == follow.follower_id && f.following_id == follow.following_id);
        if exists {
            return Ok(FollowInsert::Duplicate);
        }

        let created = Follow {
            id: Uuid::new_v4(),
            follower_id: follow.follower_id,
            following_id: follow.following_id,
            created_at: follow.created_at,
        };
        inner.follows.push(created.clone());
        Ok(FollowInsert::Created(created))
    }

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        let before = inner.follows.len();
        inner
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.following_id == following_id));
        Ok(inner.follows.len() < before)
    }

    async fn followers_of(&self, account_id: Uuid) -> AppResult<Vec<Follow>> {
        let inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        let mut edges: Vec<Follow> = inner
            .follows
            .iter()
            .filter(|f| f.following_id == account_id)
            .cloned()
            .collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(edges)
    }

    async fn following_of(&self, account_id: Uuid) -> AppResult<Vec<Follow>> {
        let inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        let mut edges: Vec<Follow> = inner
            .follows
            .iter()
            .filter(|f| f.follower_id == account_id)
            .cloned()
            .collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(edges)
    }

    async fn count_followers(&self, account_id: Uuid) -> AppResult<i64> {
        let inner = self.inner.lock().map_err(|_| lock_poisoned())?;
        Ok(inner
            .follows
            .iter()
            .filter(|f| f.following_id == account_id)
            .count() as i64)
    }

    async fn count_following(&self, account_id: Uuid) -> AppResult<i64> {
        let inner = self.inner.lock().map_err(|_| lock_poisoned())?;
        Ok(inner
            .follows
            .iter()
            .filter(|f| f.follower_id == account_id)
            .count() as i64)
    }

    async fn insert_notification(&self, notification: NewNotification) -> AppResult<Notification> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(AppError::new(
                ErrorCode::ServiceUnavailable,
                "notification store unavailable",
            ));
        }

        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        let created = Notification {
            id: Uuid::new_v4(),
            recipient_id: notification.recipient_id,
            actor_id: notification.actor_id,
            kind: notification.kind,
            thread_id: notification.thread_id,
            comment_id: notification.comment_id,
            is_read: false,
            created_at: notification.created_at,
        };
        inner.notifications.push(created.clone());
        Ok(created)
    }

    async fn notifications_for(
        &self,
        recipient_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        let mut items: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = items.len() as i64;
        let items = items
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((items, total))
    }

    async fn count_unread(&self, recipient_id: Uuid) -> AppResult<i64> {
        let inner = self.inner.lock().map_err(|_| lock_poisoned())?;
        Ok(inner
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> AppResult<Option<Notification>> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;

        let notification = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == recipient_id);

        Ok(notification.map(|n| {
            n.is_read = true;
            n.clone()
        }))
    }
}
