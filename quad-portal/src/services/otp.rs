//! Account verification codes: TOTP secret lifecycle, code derivation, and
//! validation against the stored credential.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use quad_shared::clients::email::Mailer;
use quad_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::OtpCredential;
use crate::store::PortalStore;

type HmacSha1 = Hmac<Sha1>;

const SECRET_BYTES: usize = 20; // 160 bits, the RFC 4226 recommended minimum

/// TOTP parameters. Injected from `AppConfig` so tests can pin them.
#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub step_seconds: u64,
    pub digits: u32,
    /// Steps accepted either side of the current one during validation.
    /// One step (30 s) absorbs clock drift between issue and entry.
    pub skew_steps: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            step_seconds: 30,
            digits: 6,
            skew_steps: 1,
        }
    }
}

/// Generate a fresh credential secret: 160 bits from the OS-seeded RNG,
/// base32 so standard authenticator apps can import it.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &bytes)
}

fn hotp(key: &[u8], counter: u64, digits: u32) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // RFC 4226 dynamic truncation.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    let code = binary % 10u32.pow(digits);
    format!("{code:0width$}", width = digits as usize)
}

/// The code for `secret` at `unix_time`. `None` when the stored secret is
/// not valid base32.
pub fn code_at(secret: &str, unix_time: i64, config: &OtpConfig) -> Option<String> {
    if unix_time < 0 {
        return None;
    }
    let key = base32::decode(base32::Alphabet::Rfc4648 { padding: false }, secret)?;
    let counter = unix_time as u64 / config.step_seconds;
    Some(hotp(&key, counter, config.digits))
}

/// Whether `submitted` matches the secret at any step within the skew
/// window. Each candidate is compared in constant time.
pub fn code_matches(secret: &str, submitted: &str, unix_time: i64, config: &OtpConfig) -> bool {
    let Some(key) = base32::decode(base32::Alphabet::Rfc4648 { padding: false }, secret) else {
        return false;
    };
    if submitted.len() != config.digits as usize {
        return false;
    }

    let step = config.step_seconds as i64;
    (-config.skew_steps..=config.skew_steps).any(|offset| {
        let t = unix_time + offset * step;
        if t < 0 {
            return false;
        }
        let expected = hotp(&key, t as u64 / config.step_seconds, config.digits);
        expected.as_bytes().ct_eq(submitted.as_bytes()).into()
    })
}

/// Fetch or create the credential for the account, rotating the secret when
/// absent or when `force_regenerate` is set, then email the current code.
///
/// Mail failure is logged and swallowed: the secret is already persisted,
/// and the caller can re-send by calling this again (idempotent without
/// `force_regenerate`).
pub async fn issue_or_refresh(
    store: &dyn PortalStore,
    mailer: &dyn Mailer,
    config: &OtpConfig,
    account_id: Uuid,
    force_regenerate: bool,
    now: DateTime<Utc>,
) -> AppResult<OtpCredential> {
    let profile = store
        .profile_by_account(account_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    let credential = store.get_or_create_credential(account_id, now).await?;
    let credential = if credential.secret.is_none() || force_regenerate {
        let secret = generate_secret();
        store
            .rotate_credential_secret(account_id, &secret, now)
            .await?
    } else {
        credential
    };

    if let Some(secret) = credential.secret.as_deref() {
        if let Some(code) = code_at(secret, now.timestamp(), config) {
            let subject = "Quad - Verify your account";
            let body = format!(
                "Hello {},\n\nYour verification code is: {code}\n\nThis code is valid for a short time. If you did not request this, please ignore this message.",
                profile.first_name
            );
            if let Err(e) = mailer.send(&profile.email, subject, &body).await {
                tracing::error!(
                    account_id = %account_id,
                    error = %e,
                    "failed to send verification code email"
                );
            }
        }
    }

    Ok(credential)
}

/// Validate a submitted code. Missing credential, missing secret, and
/// mismatches all return `Ok(false)`; a match persists `is_verified`.
pub async fn validate_code(
    store: &dyn PortalStore,
    config: &OtpConfig,
    account_id: Uuid,
    submitted: &str,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let Some(credential) = store.credential_by_account(account_id).await? else {
        return Ok(false);
    };
    let Some(secret) = credential.secret.as_deref() else {
        return Ok(false);
    };

    if !code_matches(secret, submitted, now.timestamp(), config) {
        return Ok(false);
    }

    store.mark_credential_verified(account_id, now).await?;
    tracing::info!(account_id = %account_id, "account verified");
    Ok(true)
}
