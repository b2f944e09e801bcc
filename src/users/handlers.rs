use axum::{extract::State, routing::get, routing::put, Json, Router};
use tracing::instrument;

use crate::auth::dto::UserResponse;
use crate::auth::extractors::AuthUser;
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::users::dto::{ChangePasswordRequest, UpdateProfileRequest};
use crate::users::services;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/profile", get(get_profile).put(update_profile))
        .route("/users/change-password", put(change_password))
}

#[instrument(skip(state))]
async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>> {
    let user = services::get_profile(&state, user_id).await?;
    Ok(Json(UserResponse { user }))
}

#[instrument(skip(state, payload))]
async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>> {
    if payload.name.trim().len() < 3 {
        return Err(Error::InvalidInput("name must be at least 3 characters".into()));
    }
    let user = services::update_profile(&state, user_id, payload.name.trim()).await?;
    Ok(Json(UserResponse { user }))
}

#[instrument(skip(state, payload))]
async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<UserResponse>> {
    if payload.new_password.len() < 8 {
        return Err(Error::InvalidInput(
            "password must be at least 8 characters".into(),
        ));
    }
    let user = services::change_password(
        &state,
        user_id,
        &payload.current_password,
        &payload.new_password,
        &payload.confirm_password,
    )
    .await?;
    Ok(Json(UserResponse { user }))
}
