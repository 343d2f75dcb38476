//! Profile lifecycle and the 7-day details-update gate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use quad_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{
    AcademicRole, Course, Department, Gender, NewProfile, Profile, ProfileDetailsUpdate,
};
use crate::store::{DetailsUpdate, PortalStore};

const MS_PER_DAY: i64 = 86_400_000;

/// Whether the details gate is open at `now`. A profile that has never had
/// a details update passes unconditionally. The boundary is inclusive: at
/// exactly `cooldown_days` elapsed the gate opens.
pub fn can_update_details(
    last_update: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_days: i64,
) -> bool {
    match last_update {
        None => true,
        Some(last) => {
            let elapsed_ms = now.signed_duration_since(last).num_milliseconds();
            elapsed_ms >= cooldown_days * MS_PER_DAY
        }
    }
}

/// Whole days until the gate reopens, rounded up so a partially elapsed day
/// still counts as one remaining. Zero when the gate is already open.
pub fn days_remaining(
    last_update: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_days: i64,
) -> i64 {
    let Some(last) = last_update else {
        return 0;
    };
    let elapsed_ms = now.signed_duration_since(last).num_milliseconds();
    let remaining_ms = cooldown_days * MS_PER_DAY - elapsed_ms;
    if remaining_ms <= 0 {
        0
    } else {
        (remaining_ms + MS_PER_DAY - 1) / MS_PER_DAY
    }
}

fn birth_date_in_past(birth_date: &NaiveDate) -> Result<(), ValidationError> {
    if *birth_date >= Utc::now().date_naive() {
        return Err(ValidationError::new("birth_date_must_be_in_the_past"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewProfileRequest {
    pub account_id: Uuid,
    #[validate(length(min = 3, max = 30))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 64))]
    pub first_name: String,
    #[validate(length(min = 1, max = 64))]
    pub last_name: String,
    #[validate(custom = "birth_date_in_past")]
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub role: AcademicRole,
    pub department: Department,
    pub course: Course,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileDetailsRequest {
    #[validate(length(min = 1, max = 64))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub last_name: Option<String>,
    #[validate(custom = "birth_date_in_past")]
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub role: Option<AcademicRole>,
    pub department: Option<Department>,
    pub course: Option<Course>,
}

impl From<ProfileDetailsRequest> for ProfileDetailsUpdate {
    fn from(req: ProfileDetailsRequest) -> Self {
        Self {
            first_name: req.first_name,
            last_name: req.last_name,
            birth_date: req.birth_date,
            gender: req.gender.map(|g| g.to_string()),
            role: req.role.map(|r| r.to_string()),
            department: req.department.map(|d| d.to_string()),
            course: req.course.map(|c| c.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileImageRequest {
    #[validate(url)]
    pub image_url: String,
}

/// Register a profile and eagerly create its verification credential so the
/// first send-code call has a row to work with.
pub async fn create_profile(
    store: &dyn PortalStore,
    request: NewProfileRequest,
    now: DateTime<Utc>,
) -> AppResult<Profile> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let new_profile = NewProfile {
        account_id: request.account_id,
        username: request.username,
        email: request.email,
        first_name: request.first_name,
        last_name: request.last_name,
        birth_date: request.birth_date,
        gender: request.gender.to_string(),
        role: request.role.to_string(),
        department: request.department.to_string(),
        course: request.course.to_string(),
        created_at: now,
        updated_at: now,
    };

    let profile = store.create_profile(new_profile).await?;
    store
        .get_or_create_credential(profile.account_id, now)
        .await?;

    tracing::info!(account_id = %profile.account_id, username = %profile.username, "profile created");
    Ok(profile)
}

pub async fn get_by_account(store: &dyn PortalStore, account_id: Uuid) -> AppResult<Profile> {
    store
        .profile_by_account(account_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))
}

pub async fn get_by_username(store: &dyn PortalStore, username: &str) -> AppResult<Profile> {
    store
        .profile_by_username(username)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))
}

/// Apply a gated details update. Rejected with `CooldownActive` (and the
/// rounded-up days remaining) while the gate is closed.
pub async fn update_details(
    store: &dyn PortalStore,
    account_id: Uuid,
    request: ProfileDetailsRequest,
    now: DateTime<Utc>,
    cooldown_days: i64,
) -> AppResult<Profile> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let update: ProfileDetailsUpdate = request.into();
    if update.is_empty() {
        return Err(AppError::Validation(
            "at least one profile field must be provided".into(),
        ));
    }

    match store
        .apply_profile_details(account_id, update, now, cooldown_days)
        .await?
    {
        DetailsUpdate::Applied(profile) => {
            tracing::info!(account_id = %account_id, "profile details updated");
            Ok(profile)
        }
        DetailsUpdate::CoolingDown { days_remaining } => Err(AppError::cooldown(days_remaining)),
    }
}

/// Replace the profile image. This path is not subject to the details gate
/// and never touches `last_profile_details_update`.
pub async fn update_image(
    store: &dyn PortalStore,
    account_id: Uuid,
    request: ProfileImageRequest,
    now: DateTime<Utc>,
) -> AppResult<Profile> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    store
        .set_profile_image(account_id, &request.image_url, now)
        .await
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    use super::*;
    use crate::store::memory::MemoryStore;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("valid timestamp")
    }

    fn details(first_name: &str) -> ProfileDetailsRequest {
        ProfileDetailsRequest {
            first_name: Some(first_name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn gate_is_open_for_a_fresh_profile() {
        assert!(can_update_details(None, t0(), 7));
        assert_eq!(days_remaining(None, t0(), 7), 0);
    }

    #[test]
    fn gate_opens_exactly_at_the_boundary() {
        let last = t0();
        let boundary = last + Duration::days(7);

        assert!(can_update_details(Some(last), boundary, 7));
        assert_eq!(days_remaining(Some(last), boundary, 7), 0);

        let just_before = boundary - Duration::milliseconds(1);
        assert!(!can_update_details(Some(last), just_before, 7));
        assert_eq!(days_remaining(Some(last), just_before, 7), 1);
    }

    #[rstest]
    #[case(Duration::hours(12), 7)]
    #[case(Duration::days(1), 6)]
    #[case(Duration::days(6) + Duration::hours(12), 1)]
    #[case(Duration::days(6) + Duration::hours(23) + Duration::minutes(59), 1)]
    fn days_remaining_rounds_partial_days_up(#[case] elapsed: Duration, #[case] expected: i64) {
        let last = t0();
        assert_eq!(days_remaining(Some(last), last + elapsed, 7), expected);
    }

    #[tokio::test]
    async fn first_details_update_applies_and_arms_the_gate() {
        let store = MemoryStore::new();
        let now = t0();
        let account = Uuid::new_v4();
        store.seed_profile(account, "alice", now);

        let updated = update_details(&store, account, details("Alicia"), now, 7)
            .await
            .expect("first update");
        assert_eq!(updated.first_name, "Alicia");
        assert_eq!(updated.last_profile_details_update, Some(now));

        let err = update_details(&store, account, details("Alice"), now + Duration::days(3), 7)
            .await
            .expect_err("gate closed");
        assert_eq!(err.days_remaining(), Some(4));

        // Untouched fields keep their values.
        let profile = get_by_account(&store, account).await.expect("profile");
        assert_eq!(profile.first_name, "Alicia");
        assert_eq!(profile.last_name, "Test");
    }

    #[tokio::test]
    async fn update_succeeds_again_after_the_cooldown() {
        let store = MemoryStore::new();
        let now = t0();
        let account = Uuid::new_v4();
        store.seed_profile(account, "bob", now);

        update_details(&store, account, details("Robert"), now, 7)
            .await
            .expect("first update");

        let later = now + Duration::days(7);
        let updated = update_details(&store, account, details("Bobby"), later, 7)
            .await
            .expect("second update after cooldown");
        assert_eq!(updated.first_name, "Bobby");
        assert_eq!(updated.last_profile_details_update, Some(later));
    }

    #[tokio::test]
    async fn empty_details_request_is_rejected_without_arming_the_gate() {
        let store = MemoryStore::new();
        let now = t0();
        let account = Uuid::new_v4();
        store.seed_profile(account, "carol", now);

        let err = update_details(&store, account, ProfileDetailsRequest::default(), now, 7)
            .await
            .expect_err("empty request");
        assert!(matches!(err, AppError::Validation(_)));

        let profile = get_by_account(&store, account).await.expect("profile");
        assert_eq!(profile.last_profile_details_update, None);
    }

    #[tokio::test]
    async fn image_update_bypasses_the_gate() {
        let store = MemoryStore::new();
        let now = t0();
        let account = Uuid::new_v4();
        store.seed_profile(account, "dave", now);

        update_details(&store, account, details("David"), now, 7)
            .await
            .expect("details update");

        // Gate is closed, but the image path is not gated.
        let request = ProfileImageRequest {
            image_url: "https://cdn.campus.test/avatars/dave.png".to_string(),
        };
        let updated = update_image(&store, account, request, now + Duration::days(1))
            .await
            .expect("image update");
        assert_eq!(
            updated.profile_image_url.as_deref(),
            Some("https://cdn.campus.test/avatars/dave.png")
        );
        assert_eq!(updated.last_profile_details_update, Some(now));
    }

    #[tokio::test]
    async fn create_profile_eagerly_provisions_a_credential() {
        let store = MemoryStore::new();
        let now = t0();
        let account = Uuid::new_v4();

        let request = NewProfileRequest {
            account_id: account,
            username: "erin".to_string(),
            email: "erin@campus.test".to_string(),
            first_name: "Erin".to_string(),
            last_name: "Reyes".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2001, 5, 20).expect("valid date"),
            gender: Gender::Female,
            role: AcademicRole::Student,
            department: Department::Ccis,
            course: Course::Bsit,
        };

        let profile = create_profile(&store, request, now).await.expect("create");
        assert_eq!(profile.username, "erin");
        assert_eq!(profile.last_profile_details_update, None);

        let credential = store
            .credential_by_account(account)
            .await
            .expect("lookup")
            .expect("credential provisioned");
        assert!(credential.secret.is_none());
        assert!(!credential.is_verified);
    }

    #[tokio::test]
    async fn future_birth_date_is_rejected_on_create_and_update() {
        let store = MemoryStore::new();
        let now = t0();
        let future = NaiveDate::from_ymd_opt(2999, 1, 1).expect("valid date");

        let request = NewProfileRequest {
            account_id: Uuid::new_v4(),
            username: "frank".to_string(),
            email: "frank@campus.test".to_string(),
            first_name: "Frank".to_string(),
            last_name: "Cruz".to_string(),
            birth_date: future,
            gender: Gender::Male,
            role: AcademicRole::Student,
            department: Department::Cas,
            course: Course::Bsis,
        };
        let err = create_profile(&store, request, now).await.expect_err("future date");
        assert!(matches!(err, AppError::Validation(_)));

        let account = Uuid::new_v4();
        store.seed_profile(account, "grace", now);
        let request = ProfileDetailsRequest {
            birth_date: Some(future),
            ..Default::default()
        };
        let err = update_details(&store, account, request, now, 7)
            .await
            .expect_err("future date");
        assert!(matches!(err, AppError::Validation(_)));

        // The rejected update must not arm the gate.
        let profile = get_by_account(&store, account).await.expect("profile");
        assert_eq!(profile.last_profile_details_update, None);
    }

    #[tokio::test]
    async fn create_profile_rejects_invalid_input() {
        let store = MemoryStore::new();
        let request = NewProfileRequest {
            account_id: Uuid::new_v4(),
            username: "ab".to_string(),
            email: "not-an-email".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2001, 5, 20).expect("valid date"),
            gender: Gender::Male,
            role: AcademicRole::Student,
            department: Department::Coe,
            course: Course::Bscpe,
        };

        let err = create_profile(&store, request, t0()).await.expect_err("invalid");
        assert!(matches!(err, AppError::Validation(_)));
    }
}
