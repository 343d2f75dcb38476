use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Identity/verification errors
/// - E2xxx: Profile and follow-graph errors
/// - E3xxx: Notification errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,
    ServiceUnavailable,

    // Identity/verification (E1xxx)
    TokenExpired,
    TokenInvalid,

    // Profile and follows (E2xxx)
    ProfileNotFound,
    CooldownActive,
    FollowAlreadyExists,
    FollowNotFound,
    CannotFollowSelf,

    // Notifications (E3xxx)
    NotificationNotFound,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0006",
            Self::ServiceUnavailable => "E0007",

            // Identity/verification
            Self::TokenExpired => "E1001",
            Self::TokenInvalid => "E1002",

            // Profile and follows
            Self::ProfileNotFound => "E2001",
            Self::CooldownActive => "E2002",
            Self::FollowAlreadyExists => "E2003",
            Self::FollowNotFound => "E2004",
            Self::CannotFollowSelf => "E2005",

            // Notifications
            Self::NotificationNotFound => "E3001",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationError | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden | Self::CooldownActive => StatusCode::FORBIDDEN,
            Self::NotFound | Self::ProfileNotFound | Self::NotificationNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::FollowAlreadyExists | Self::FollowNotFound | Self::CannotFollowSelf => {
                StatusCode::CONFLICT
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Profile-details update rejected while the 7-day gate is closed.
    pub fn cooldown(days_remaining: i64) -> Self {
        Self::with_details(
            ErrorCode::CooldownActive,
            format!(
                "profile details can only be updated once every 7 days, wait {days_remaining} more day(s)"
            ),
            serde_json::json!({ "days_remaining": days_remaining }),
        )
    }

    pub fn days_remaining(&self) -> Option<i64> {
        match self {
            Self::Known {
                code: ErrorCode::CooldownActive,
                details: Some(details),
                ..
            } => details.get("days_remaining").and_then(|d| d.as_i64()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known {
                code,
                message,
                details,
            } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
