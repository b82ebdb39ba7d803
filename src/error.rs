// Error taxonomy for the HTTP surface

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::{
    identifier::Identifier,
    jwt::TokenError,
    otp::OtpError,
    repo::{ConflictField, StoreError},
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Access denied. No token provided.")]
    Unauthenticated,

    #[error("Token expired. Please login again.")]
    TokenExpired,

    #[error("Invalid token.")]
    InvalidToken,

    #[error("Invalid token. User not found.")]
    UserNotFound,

    #[error("Access denied. Admin privileges required.")]
    Forbidden,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Please verify your account first")]
    NotVerified { identifier: Option<Identifier> },

    #[error("Admin account already exists. Setup is complete.")]
    AdminExists,

    #[error("{0}")]
    NotFound(String),

    #[error("Account already verified")]
    AlreadyVerified,

    #[error("No verification code has been issued. Please request a new one.")]
    NoChallenge,

    #[error("Invalid or expired OTP")]
    OtpInvalid,

    #[error("OTP expired. Please request a new one.")]
    OtpExpired,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Conflict(_)
            | ApiError::AlreadyVerified
            | ApiError::NoChallenge
            | ApiError::OtpInvalid
            | ApiError::OtpExpired => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated
            | ApiError::TokenExpired
            | ApiError::UserNotFound
            | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken
            | ApiError::Forbidden
            | ApiError::NotVerified { .. }
            | ApiError::AdminExists => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind sent alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Conflict(_) => "conflict",
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::TokenExpired => "token_expired",
            ApiError::InvalidToken => "invalid_token",
            ApiError::UserNotFound => "user_not_found",
            ApiError::Forbidden => "forbidden",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::NotVerified { .. } => "not_verified",
            ApiError::AdminExists => "admin_exists",
            ApiError::NotFound(_) => "not_found",
            ApiError::AlreadyVerified => "already_verified",
            ApiError::NoChallenge => "no_challenge",
            ApiError::OtpInvalid => "otp_invalid",
            ApiError::OtpExpired => "otp_expired",
            ApiError::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_verification: Option<bool>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(e) = &self {
            let detail = format!("{e:#}");
            error!(error = %detail, "request failed");
        }

        let status = self.status();
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
            needs_verification: matches!(self, ApiError::NotVerified { .. }).then_some(true),
            identifier: match self {
                ApiError::NotVerified { identifier } => identifier,
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(ConflictField::Username) => {
                ApiError::Conflict("Username already exists".into())
            }
            StoreError::Conflict(ConflictField::Identifier) => {
                ApiError::Conflict("Identifier already registered".into())
            }
            StoreError::Missing => ApiError::NotFound("User not found".into()),
            StoreError::Internal(e) => ApiError::Internal(e),
        }
    }
}

impl From<OtpError> for ApiError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::NoChallenge => ApiError::NoChallenge,
            OtpError::Expired => ApiError::OtpExpired,
            OtpError::Mismatch => ApiError::OtpInvalid,
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => ApiError::TokenExpired,
            TokenError::Malformed | TokenError::Invalid => ApiError::InvalidToken,
            TokenError::Signing(e) => ApiError::Internal(anyhow::Error::new(e).context("sign token")),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}
