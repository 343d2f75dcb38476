use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{follows, notifications, otp_credentials, profiles};

// --- Domain enums (stored as text, validated at the edge) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcademicRole {
    Student,
    Faculty,
}

impl std::fmt::Display for AcademicRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcademicRole::Student => write!(f, "student"),
            AcademicRole::Faculty => write!(f, "faculty"),
        }
    }
}

/// College codes: computing, engineering, business, arts and sciences,
/// teacher education.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Ccis,
    Coe,
    Cbt,
    Cas,
    Cte,
}

impl std::fmt::Display for Department {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Department::Ccis => write!(f, "ccis"),
            Department::Coe => write!(f, "coe"),
            Department::Cbt => write!(f, "cbt"),
            Department::Cas => write!(f, "cas"),
            Department::Cte => write!(f, "cte"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Course {
    Bscs,
    Bsit,
    Bsis,
    Bscpe,
}

impl std::fmt::Display for Course {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Course::Bscs => write!(f, "bscs"),
            Course::Bsit => write!(f, "bsit"),
            Course::Bsis => write!(f, "bsis"),
            Course::Bscpe => write!(f, "bscpe"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Like => write!(f, "like"),
            NotificationKind::Comment => write!(f, "comment"),
            NotificationKind::Follow => write!(f, "follow"),
        }
    }
}

// --- Profile ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub role: String,
    pub department: String,
    pub course: String,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_profile_details_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub role: String,
    pub department: String,
    pub course: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial change set for the gated details update. The image is
/// deliberately absent here: it mutates through its own ungated path.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = profiles)]
pub struct ProfileDetailsUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub course: Option<String>,
}

impl ProfileDetailsUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.birth_date.is_none()
            && self.gender.is_none()
            && self.role.is_none()
            && self.department.is_none()
            && self.course.is_none()
    }
}

// --- OTP credential ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = otp_credentials)]
pub struct OtpCredential {
    pub id: Uuid,
    pub account_id: Uuid,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub is_verified: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = otp_credentials)]
pub struct NewOtpCredential {
    pub account_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

// --- Follow edge ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = follows)]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = follows)]
pub struct NewFollow {
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// --- Notification ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub kind: String,
    pub thread_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub kind: String,
    pub thread_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
