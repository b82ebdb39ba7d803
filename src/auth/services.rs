use anyhow::Context;
use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{CredentialsRequest, RegisterRequest};
use super::identifier::{Identifier, IdentifierKind};
use super::jwt::JwtKeys;
use super::otp;
use super::password;
use super::repo::{BootstrapOutcome, ConflictField, StoreError, UserStore};
use super::repo_types::User;
use crate::error::ApiError;
use crate::notify::Delivery;
use crate::state::AppState;

pub struct Registered {
    pub user_id: Uuid,
    pub delivery: Delivery,
}

/// Token plus the user it was issued for.
pub struct Session {
    pub token: String,
    pub user: User,
}

pub(crate) fn normalize_username(raw: &str) -> Result<String, ApiError> {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[a-z0-9_.-]{3,32}$").unwrap();
    }
    let username = raw.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::Validation("Username is required".into()));
    }
    if username.chars().count() < 3 {
        return Err(ApiError::Validation(
            "Username must be at least 3 characters".into(),
        ));
    }
    if !USERNAME_RE.is_match(&username) {
        return Err(ApiError::Validation(
            "Username may only contain letters, digits, '.', '_' or '-' (max 32)".into(),
        ));
    }
    Ok(username)
}

pub(crate) fn check_password(plain: &str) -> Result<(), ApiError> {
    password::check_policy(plain).map_err(ApiError::Validation)
}

fn parse_identifier(kind: IdentifierKind, raw: &str) -> Result<Identifier, ApiError> {
    kind.parse_value(raw).map_err(ApiError::Validation)
}

fn identifier_conflict(kind: IdentifierKind) -> ApiError {
    match kind {
        IdentifierKind::Email => ApiError::Conflict("Email already registered".into()),
        IdentifierKind::Mobile => ApiError::Conflict("Mobile number already registered".into()),
    }
}

async fn hash_off_thread(plain: &str) -> Result<String, ApiError> {
    let plain = plain.to_owned();
    let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .context("join hash task")??;
    Ok(hash)
}

async fn verify_off_thread(plain: &str, hash: Option<String>) -> Result<bool, ApiError> {
    let plain = plain.to_owned();
    let ok = tokio::task::spawn_blocking(move || match hash {
        Some(hash) => password::verify_password(&plain, &hash),
        None => {
            password::verify_against_dummy(&plain);
            Ok(false)
        }
    })
    .await
    .context("join verify task")??;
    Ok(ok)
}

fn issue_token(state: &AppState, user: &User) -> Result<String, ApiError> {
    Ok(JwtKeys::from_ref(state).sign(user)?)
}

/// Create an unverified account and send its first verification code.
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<Registered, ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() || req.identifier.trim().is_empty()
    {
        return Err(ApiError::Validation(format!(
            "Username, password, and {} are required",
            state.config.identifier_kind.as_str()
        )));
    }
    let username = normalize_username(&req.username)?;
    check_password(&req.password)?;
    let kind = state.config.identifier_kind;
    let identifier = parse_identifier(kind, &req.identifier)?;

    let hash = hash_off_thread(&req.password).await?;
    let mut user = User::pending(username, hash, identifier.clone());
    let code = state.otp.issue(&mut user, OffsetDateTime::now_utc());

    match state.store.create(&user).await {
        Ok(()) => {}
        Err(StoreError::Conflict(field)) => {
            warn!(username = %user.username, %field, "registration conflict");
            return Err(match field {
                ConflictField::Username => ApiError::Conflict("Username already exists".into()),
                ConflictField::Identifier => identifier_conflict(kind),
            });
        }
        Err(e) => return Err(e.into()),
    }
    info!(user_id = %user.id, username = %user.username, "user registered");

    let delivery = state.notifier.send(&identifier, &code, &user.username).await;
    Ok(Registered {
        user_id: user.id,
        delivery,
    })
}

/// Issue a fresh code to an unverified account, replacing any previous one.
pub async fn resend_otp(state: &AppState, raw_identifier: &str) -> Result<Delivery, ApiError> {
    let kind = state.config.identifier_kind;
    if raw_identifier.trim().is_empty() {
        return Err(ApiError::Validation(format!("{} is required", kind.as_str())));
    }
    let identifier = parse_identifier(kind, raw_identifier)?;

    let mut user = state
        .store
        .find_by_identifier(&identifier)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found with this {}", kind.as_str())))?;
    if user.is_verified {
        return Err(ApiError::AlreadyVerified);
    }

    let code = state.otp.issue(&mut user, OffsetDateTime::now_utc());
    state.store.save(&user).await?;
    info!(user_id = %user.id, "otp reissued");

    Ok(state.notifier.send(&identifier, &code, &user.username).await)
}

/// Consume a verification code, mark the account verified and log it in.
pub async fn verify_otp(
    state: &AppState,
    raw_identifier: &str,
    submitted: &str,
) -> Result<Session, ApiError> {
    let kind = state.config.identifier_kind;
    let submitted = submitted.trim();
    if raw_identifier.trim().is_empty() || submitted.is_empty() {
        return Err(ApiError::Validation(format!(
            "{} and OTP are required",
            kind.as_str()
        )));
    }
    let identifier = parse_identifier(kind, raw_identifier)?;
    if !otp::is_well_formed(submitted) {
        return Err(ApiError::Validation("OTP must be 6 digits".into()));
    }

    let mut user = state
        .store
        .find_by_identifier(&identifier)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    if user.is_verified {
        return Err(ApiError::AlreadyVerified);
    }

    if let Err(e) = state.otp.verify(&mut user, submitted, OffsetDateTime::now_utc()) {
        warn!(user_id = %user.id, error = %e, "otp rejected");
        return Err(e.into());
    }
    user.is_verified = true;
    state.store.save(&user).await?;
    info!(user_id = %user.id, "user verified");

    let token = issue_token(state, &user)?;
    Ok(Session { token, user })
}

/// Password login. Unknown user and wrong password are indistinguishable.
pub async fn login(state: &AppState, req: CredentialsRequest) -> Result<Session, ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Username and password are required".into(),
        ));
    }
    let username = req.username.trim().to_lowercase();
    if req.password.len() > password::MAX_PASSWORD_LEN {
        warn!(%username, "login password over length limit");
        return Err(ApiError::InvalidCredentials);
    }

    let user = state.store.find_by_username(&username).await?;
    let hash = user.as_ref().map(|u| u.password_hash.clone());
    let ok = verify_off_thread(&req.password, hash).await?;

    let user = match user {
        Some(user) if ok => user,
        Some(user) => {
            warn!(user_id = %user.id, "login invalid password");
            return Err(ApiError::InvalidCredentials);
        }
        None => {
            warn!(%username, "login unknown username");
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !user.is_verified {
        warn!(user_id = %user.id, "login before verification");
        return Err(ApiError::NotVerified {
            identifier: user.identifier,
        });
    }

    let token = issue_token(state, &user)?;
    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(Session { token, user })
}

/// Create the very first admin. Refuses forever once any admin exists.
pub async fn bootstrap_admin(
    state: &AppState,
    req: CredentialsRequest,
) -> Result<Session, ApiError> {
    if state.store.find_any_admin().await?.is_some() {
        return Err(ApiError::AdminExists);
    }
    let username = normalize_username(&req.username)?;
    check_password(&req.password)?;

    let hash = hash_off_thread(&req.password).await?;
    let admin = User::admin(username, hash);
    match state.store.create_first_admin(&admin).await? {
        BootstrapOutcome::Created => {}
        BootstrapOutcome::Closed => {
            warn!("setup raced with another bootstrap");
            return Err(ApiError::AdminExists);
        }
    }
    info!(user_id = %admin.id, username = %admin.username, "first admin bootstrapped");

    let token = issue_token(state, &admin)?;
    Ok(Session { token, user: admin })
}

/// Create an additional admin on behalf of an existing one.
pub async fn create_admin(
    state: &AppState,
    actor: &User,
    req: CredentialsRequest,
) -> Result<User, ApiError> {
    let username = normalize_username(&req.username)?;
    check_password(&req.password)?;

    let hash = hash_off_thread(&req.password).await?;
    let admin = User::admin(username, hash);
    state.store.create(&admin).await?;
    info!(user_id = %admin.id, created_by = %actor.id, "admin created");
    Ok(admin)
}

pub async fn setup_required(state: &AppState) -> Result<bool, ApiError> {
    Ok(state.store.find_any_admin().await?.is_none())
}
