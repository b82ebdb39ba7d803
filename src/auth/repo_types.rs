use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::identifier::Identifier;

/// Outstanding verification challenge. Code and expiry only exist together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: OffsetDateTime,
}

/// User record as the rest of the crate sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed in JSON
    pub identifier: Option<Identifier>,
    pub is_verified: bool,
    pub is_admin: bool,
    #[serde(skip_serializing)]
    pub otp: Option<OtpChallenge>,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Fresh account awaiting verification of its contact channel.
    pub fn pending(username: String, password_hash: String, identifier: Identifier) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            password_hash,
            identifier: Some(identifier),
            is_verified: false,
            is_admin: false,
            otp: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Admin account; there is no channel to verify so it starts verified.
    pub fn admin(username: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            password_hash,
            identifier: None,
            is_verified: true,
            is_admin: true,
            otp: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Row shape of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub identifier_kind: Option<String>,
    pub identifier: Option<String>,
    pub is_verified: bool,
    pub is_admin: bool,
    pub otp_code: Option<String>,
    pub otp_expiry: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        let identifier = match (r.identifier_kind, r.identifier) {
            (Some(kind), Some(value)) => Identifier::from_parts(&kind, value),
            _ => None,
        };
        let otp = match (r.otp_code, r.otp_expiry) {
            (Some(code), Some(expires_at)) => Some(OtpChallenge { code, expires_at }),
            _ => None,
        };
        Self {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            identifier,
            is_verified: r.is_verified,
            is_admin: r.is_admin,
            otp,
            created_at: r.created_at,
        }
    }
}
