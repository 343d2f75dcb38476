use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token claims minted by the external identity service. The portal only
/// validates and reads them; it never issues tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl Claims {
    pub fn new(account_id: Uuid, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: account_id,
            iat: now,
            exp: now + duration_secs,
            jti: Uuid::now_v7(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// The authenticated caller, as resolved from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub token_id: Uuid,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            token_id: claims.jti,
        }
    }
}
