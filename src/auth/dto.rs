use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identifier::Identifier;
use super::repo_types::User;

/// Request body for user registration. The contact value may be sent as
/// `identifier` or under its channel name.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "email", alias = "mobile")]
    pub identifier: String,
}

/// Request body for (re)sending a verification code.
#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default, alias = "email", alias = "mobile")]
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default, alias = "email", alias = "mobile")]
    pub identifier: String,
    #[serde(default)]
    pub otp: String,
}

/// Request body for login, `/setup` and `/create-admin`.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
    /// Present only when the code could not be delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

/// Response returned after verify-otp, login and setup.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct TokenCheckResponse {
    pub valid: bool,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct CreateAdminResponse {
    pub message: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStatusResponse {
    pub setup_required: bool,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,
    pub is_verified: bool,
    pub is_admin: bool,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            identifier: u.identifier.clone(),
            is_verified: u.is_verified,
            is_admin: u.is_admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_hides_secrets() {
        let mut user = User::pending(
            "alice".into(),
            "$argon2id$secret".into(),
            Identifier::Email("a@x.com".into()),
        );
        user.otp = Some(crate::auth::repo_types::OtpChallenge {
            code: "123456".into(),
            expires_at: time::OffsetDateTime::now_utc(),
        });
        let json = serde_json::to_string(&PublicUser::from(&user)).unwrap();
        assert!(json.contains("\"email\":\"a@x.com\""));
        assert!(json.contains("\"isVerified\":false"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("123456"));
    }

    #[test]
    fn register_accepts_channel_alias() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"username":"bob","password":"secret1","mobile":"5551234567"}"#,
        )
        .unwrap();
        assert_eq!(req.identifier, "5551234567");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let req: VerifyOtpRequest = serde_json::from_str("{}").unwrap();
        assert!(req.identifier.is_empty());
        assert!(req.otp.is_empty());
    }
}
