use tracing::info;
use uuid::Uuid;

use crate::auth::services::{hash_password, verify_password};
use crate::error::{Error, Result};
use crate::models::User;
use crate::state::AppState;

pub async fn get_profile(state: &AppState, user_id: Uuid) -> Result<User> {
    let snapshot = state.store.read().await;
    snapshot.users().get(user_id).ok_or(Error::NotFound("user"))
}

pub async fn update_profile(state: &AppState, user_id: Uuid, name: &str) -> Result<User> {
    let mut tx = state.store.begin().await;
    let mut user = tx.users().get(user_id).ok_or(Error::NotFound("user"))?;
    user.name = name.to_string();
    tx.users().put(user.id, user.clone());
    tx.commit();
    Ok(user)
}

/// The current password gates the change; its failure is a credentials
/// failure, not a validation one.
pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<User> {
    let mut tx = state.store.begin().await;
    let mut user = tx.users().get(user_id).ok_or(Error::NotFound("user"))?;

    if new_password != confirm_password {
        return Err(Error::PasswordMismatch);
    }
    if !verify_password(current_password, &user.password_hash)? {
        return Err(Error::InvalidCredentials);
    }

    // Fresh salt on every password write.
    user.password_hash = hash_password(new_password)?;
    tx.users().put(user.id, user.clone());
    tx.commit();

    info!(user_id = %user.id, "password changed");
    Ok(user)
}
