use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::auth::dto::{
    LoginRequest, MessageResponse, RefreshRequest, RegisterRequest, ResetPasswordRequest,
    ResetRequest, UserResponse, VerifyEmailRequest,
};
use crate::auth::services::{self, is_valid_email};
use crate::error::{Error, Result};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/auth/reset-password-request", post(reset_password_request))
        .route("/auth/reset-password", post(reset_password))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<crate::auth::dto::RegisterResponse>)> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(Error::InvalidInput("invalid email address".into()));
    }
    if payload.name.trim().len() < 3 {
        return Err(Error::InvalidInput("name must be at least 3 characters".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(Error::InvalidInput(
            "password must be at least 8 characters".into(),
        ));
    }

    let res = services::register(&state, payload.name.trim(), &payload.email, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<Json<UserResponse>> {
    if payload.token.is_empty() {
        return Err(Error::InvalidInput("verification token is required".into()));
    }
    let user = services::verify_email(&state, &payload.token).await?;
    Ok(Json(UserResponse { user }))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<crate::auth::dto::AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(Error::InvalidInput("invalid email address".into()));
    }
    let res = services::login(&state, &payload.email, &payload.password).await?;
    Ok(Json(res))
}

#[instrument(skip(state, payload))]
async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<crate::auth::dto::RefreshResponse>> {
    if payload.refresh_token.is_empty() {
        return Err(Error::InvalidInput("refresh token is required".into()));
    }
    let res = services::refresh(&state, &payload.refresh_token).await?;
    Ok(Json(res))
}

#[instrument(skip(state, payload))]
async fn reset_password_request(
    State(state): State<AppState>,
    Json(mut payload): Json<ResetRequest>,
) -> Result<Json<MessageResponse>> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        return Err(Error::InvalidInput("invalid email address".into()));
    }
    services::request_password_reset(&state, &payload.email).await?;
    Ok(Json(MessageResponse {
        message: "password reset email sent".into(),
    }))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<UserResponse>> {
    if payload.token.is_empty() {
        return Err(Error::InvalidInput("reset password token is required".into()));
    }
    if payload.new_password.len() < 8 || payload.confirm_password.len() < 8 {
        return Err(Error::InvalidInput(
            "password must be at least 8 characters".into(),
        ));
    }
    let user = services::reset_password(
        &state,
        &payload.token,
        &payload.new_password,
        &payload.confirm_password,
    )
    .await?;
    Ok(Json(UserResponse { user }))
}
