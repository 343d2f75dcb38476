use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use quad_shared::errors::{AppError, AppResult, ErrorCode};
use quad_shared::types::auth::AuthUser;
use quad_shared::types::ApiResponse;

use crate::models::OtpCredential;
use crate::services::otp;
use crate::AppState;

// --- POST /verification/send ---

#[derive(Debug, Default, Deserialize)]
pub struct SendCodeRequest {
    #[serde(default)]
    pub force_regenerate: bool,
}

pub async fn send_code(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    payload: Option<Json<SendCodeRequest>>,
) -> AppResult<Json<ApiResponse<OtpCredential>>> {
    let req = payload.map(|Json(r)| r).unwrap_or_default();

    let credential = otp::issue_or_refresh(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.otp,
        user.id,
        req.force_regenerate,
        Utc::now(),
    )
    .await?;

    Ok(Json(ApiResponse::ok_with_message(
        credential,
        "verification code sent",
    )))
}

// --- POST /verification/validate ---

#[derive(Debug, Deserialize)]
pub struct ValidateCodeRequest {
    pub code: String,
}

pub async fn validate_code(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateCodeRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let verified = otp::validate_code(
        state.store.as_ref(),
        &state.otp,
        user.id,
        req.code.trim(),
        Utc::now(),
    )
    .await?;

    if !verified {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "invalid or expired verification code",
        ));
    }

    Ok(Json(ApiResponse::ok_with_message(
        serde_json::json!({ "verified": true }),
        "account verified",
    )))
}
