use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        AuthResponse, CreateAdminResponse, CredentialsRequest, PublicUser, RegisterRequest,
        RegisterResponse, SendOtpRequest, SendOtpResponse, SetupStatusResponse,
        TokenCheckResponse, UserResponse, VerifyOtpRequest,
    },
    extractors::{AdminUser, AuthUser},
    services,
};
use crate::{error::ApiError, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/login", post(login))
        .route("/verify", get(verify_token))
        .route("/me", get(get_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/create-admin", post(create_admin))
        .route("/setup", post(setup))
        .route("/setup-status", get(setup_status))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(payload) = payload?;
    let registered = services::register(&state, payload).await?;

    let message = if registered.delivery.delivered {
        "Registration successful! Please check your inbox for the verification code."
    } else {
        "Registration successful! Please verify your account."
    };
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: message.into(),
            user_id: registered.user_id,
            otp: registered.delivery.fallback_code,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn send_otp(
    State(state): State<AppState>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<Json<SendOtpResponse>, ApiError> {
    let Json(payload) = payload?;
    let delivery = services::resend_otp(&state, &payload.identifier).await?;
    Ok(Json(SendOtpResponse {
        message: "OTP sent successfully!".into(),
        otp: delivery.fallback_code,
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(payload) = payload?;
    let session = services::verify_otp(&state, &payload.identifier, &payload.otp).await?;
    Ok(Json(AuthResponse {
        message: "Account verified successfully!".into(),
        user: PublicUser::from(&session.user),
        token: session.token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(payload) = payload?;
    let session = services::login(&state, payload).await?;
    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        user: PublicUser::from(&session.user),
        token: session.token,
    }))
}

#[instrument(skip_all)]
pub async fn verify_token(AuthUser(user): AuthUser) -> Json<TokenCheckResponse> {
    Json(TokenCheckResponse {
        valid: true,
        user: PublicUser::from(&user),
    })
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse {
        user: PublicUser::from(&user),
    })
}

#[instrument(skip_all)]
pub async fn create_admin(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateAdminResponse>), ApiError> {
    let Json(payload) = payload?;
    let admin = services::create_admin(&state, &actor, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateAdminResponse {
            message: "Admin account created".into(),
            user: PublicUser::from(&admin),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn setup(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(payload) = payload?;
    let session = services::bootstrap_admin(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Admin account created. Setup complete.".into(),
            user: PublicUser::from(&session.user),
            token: session.token,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn setup_status(
    State(state): State<AppState>,
) -> Result<Json<SetupStatusResponse>, ApiError> {
    Ok(Json(SetupStatusResponse {
        setup_required: services::setup_required(&state).await?,
    }))
}
