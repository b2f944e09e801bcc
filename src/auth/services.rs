use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::dto::{AuthResponse, RefreshResponse, RegisterResponse};
use crate::auth::token::Audience;
use crate::auth::verification;
use crate::error::{Error, Result};
use crate::mailer;
use crate::models::User;
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// One transaction: duplicate check, user insert, verification record,
/// email dispatch. A dispatch failure aborts everything so no unverified
/// user exists without a notification path.
pub async fn register(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
) -> Result<RegisterResponse> {
    let mut tx = state.store.begin().await;
    if tx.users().find(|u| u.email == email).is_some() {
        return Err(Error::Conflict("user already exists with this email".into()));
    }

    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: hash_password(password)?,
        name: name.to_string(),
        email_verified: false,
        last_login: None,
        created_at: OffsetDateTime::now_utc(),
    };
    tx.users().put(user.id, user.clone());

    let issued = state.tokens.sign_email_verification(user.id)?;
    verification::create(&mut tx, user.id, &issued.token, issued.expires_at);

    mailer::deliver_verification(state.mailer.as_ref(), &state.config, &user, &issued.token)
        .await
        .map_err(Error::EmailDispatch)?;

    tx.commit();
    info!(user_id = %user.id, "user registered");
    Ok(RegisterResponse {
        user,
        verification_token: issued.token,
    })
}

pub async fn verify_email(state: &AppState, token: &str) -> Result<User> {
    let claims = state.tokens.verify(token, Audience::EmailVerification)?;

    let mut tx = state.store.begin().await;
    let now = OffsetDateTime::now_utc();
    let record = verification::consume(&mut tx, token, claims.sub, now)?;

    let mut user = tx.users().get(record.user_id).ok_or(Error::NotFound("user"))?;
    if user.email_verified {
        return Err(Error::AlreadyVerified);
    }
    user.email_verified = true;
    tx.users().put(user.id, user.clone());
    tx.commit();

    info!(user_id = %user.id, "email verified");
    Ok(user)
}

/// Unknown email and wrong password fail identically. An unverified user
/// with no live verification record gets a fresh one plus an email before
/// the `EmailNotVerified` comes back; that record must survive, so the
/// transaction commits before the error returns.
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<AuthResponse> {
    let mut tx = state.store.begin().await;
    let user = tx
        .users()
        .find(|u| u.email == email)
        .ok_or(Error::InvalidCredentials)?;
    if !verify_password(password, &user.password_hash)? {
        return Err(Error::InvalidCredentials);
    }

    if !user.email_verified {
        let now = OffsetDateTime::now_utc();
        if verification::live_for_user(&mut tx, user.id, now).is_some() {
            return Err(Error::EmailNotVerified { resent: false });
        }
        verification::purge_for_user(&mut tx, user.id);
        let issued = state.tokens.sign_email_verification(user.id)?;
        verification::create(&mut tx, user.id, &issued.token, issued.expires_at);
        mailer::deliver_verification(state.mailer.as_ref(), &state.config, &user, &issued.token)
            .await
            .map_err(Error::EmailDispatch)?;
        tx.commit();
        return Err(Error::EmailNotVerified { resent: true });
    }

    let access = state.tokens.sign_access(user.id)?;
    let refresh = state.tokens.sign_refresh(user.id)?;

    let mut user = user;
    user.last_login = Some(OffsetDateTime::now_utc());
    tx.users().put(user.id, user.clone());
    tx.commit();

    info!(user_id = %user.id, "user logged in");
    Ok(AuthResponse {
        user,
        access_token: access.token,
        refresh_token: refresh.token,
        expires_at: access.expires_at,
    })
}

/// Issues a new access token only. The refresh token is never rotated or
/// revoked; it stays valid for its full lifetime.
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<RefreshResponse> {
    let claims = state.tokens.verify(refresh_token, Audience::Refresh)?;

    let snapshot = state.store.read().await;
    let user = snapshot.users().get(claims.sub).ok_or(Error::NotFound("user"))?;

    let access = state.tokens.sign_access(user.id)?;
    Ok(RefreshResponse {
        user,
        access_token: access.token,
        expires_at: access.expires_at,
    })
}

pub async fn request_password_reset(state: &AppState, email: &str) -> Result<()> {
    let mut tx = state.store.begin().await;
    let user = tx
        .users()
        .find(|u| u.email == email)
        .ok_or(Error::NotFound("user"))?;
    if !user.email_verified {
        return Err(Error::EmailNotVerified { resent: false });
    }

    let now = OffsetDateTime::now_utc();
    if verification::live_for_user(&mut tx, user.id, now).is_some() {
        return Err(Error::Conflict(
            "a reset password request is already pending".into(),
        ));
    }
    verification::purge_for_user(&mut tx, user.id);

    let issued = state.tokens.sign_password_reset(user.id)?;
    verification::create(&mut tx, user.id, &issued.token, issued.expires_at);

    mailer::deliver_password_reset(state.mailer.as_ref(), &state.config, &user, &issued.token)
        .await
        .map_err(Error::EmailDispatch)?;

    tx.commit();
    info!(user_id = %user.id, "password reset requested");
    Ok(())
}

pub async fn reset_password(
    state: &AppState,
    token: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<User> {
    let claims = state.tokens.verify(token, Audience::ResetPassword)?;

    let mut tx = state.store.begin().await;
    let now = OffsetDateTime::now_utc();
    let record = tx
        .verifications()
        .find(|v| v.token == token && v.user_id == claims.sub)
        .ok_or(Error::NotFound("verification record"))?;
    if record.is_expired(now) {
        return Err(Error::TokenExpired);
    }

    let mut user = tx.users().get(record.user_id).ok_or(Error::NotFound("user"))?;
    if new_password != confirm_password {
        return Err(Error::PasswordMismatch);
    }

    // Fresh salt on every password write.
    user.password_hash = hash_password(new_password)?;
    tx.users().put(user.id, user.clone());
    verification::purge_for_user(&mut tx, user.id);
    tx.commit();

    info!(user_id = %user.id, "password reset");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::testing::{FailingMailer, RecordingMailer};
    use std::sync::Arc;
    use time::Duration;

    async fn registered(state: &AppState) -> (User, String) {
        let res = register(state, "Test User", "user@example.com", "password123")
            .await
            .expect("register");
        (res.user, res.verification_token)
    }

    async fn verified(state: &AppState) -> User {
        let (_, token) = registered(state).await;
        verify_email(state, &token).await.expect("verify email")
    }

    /// Swaps the user's single verification record for one that lapsed an
    /// hour ago, keeping its token verifiable-but-expired.
    async fn expire_records(state: &AppState, user_id: Uuid) -> String {
        let stale = state
            .tokens
            .issue_at(
                user_id,
                Audience::EmailVerification,
                Duration::hours(1),
                OffsetDateTime::now_utc() - Duration::hours(2),
            )
            .expect("sign stale token");
        let mut tx = state.store.begin().await;
        verification::purge_for_user(&mut tx, user_id);
        verification::create(&mut tx, user_id, &stale.token, stale.expires_at);
        tx.commit();
        stale.token
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let state = AppState::fake();
        registered(&state).await;
        let err = register(&state, "Other", "user@example.com", "password456")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn register_dispatch_failure_leaves_no_user_behind() {
        let state = AppState::fake_with_mailer(Arc::new(FailingMailer));
        let err = register(&state, "Test User", "user@example.com", "password123")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmailDispatch(_)));

        let snapshot = state.store.read().await;
        assert!(snapshot.users().find(|u| u.email == "user@example.com").is_none());
    }

    #[tokio::test]
    async fn register_persists_user_record_and_token() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::fake_with_mailer(mailer.clone());
        let (user, token) = registered(&state).await;

        assert!(!user.email_verified);
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains(&token));

        let mut tx = state.store.begin().await;
        let record = tx
            .verifications()
            .find(|v| v.user_id == user.id)
            .expect("verification record");
        assert_eq!(record.token, token);
        tx.abort();
    }

    #[tokio::test]
    async fn verify_email_marks_user_and_consumes_record() {
        let state = AppState::fake();
        let (user, token) = registered(&state).await;

        let updated = verify_email(&state, &token).await.expect("verify");
        assert!(updated.email_verified);

        let mut tx = state.store.begin().await;
        assert!(tx.verifications().find(|v| v.user_id == user.id).is_none());
        tx.abort();

        // The single-use record is gone, so replay fails.
        let err = verify_email(&state, &token).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn expired_verification_token_leaves_user_unverified() {
        let state = AppState::fake();
        let (user, _) = registered(&state).await;
        let stale_token = expire_records(&state, user.id).await;

        let err = verify_email(&state, &stale_token).await.unwrap_err();
        assert!(matches!(err, Error::TokenExpired));

        let snapshot = state.store.read().await;
        let unchanged = snapshot.users().get(user.id).expect("user");
        assert!(!unchanged.email_verified);
    }

    #[tokio::test]
    async fn verify_email_twice_is_already_verified() {
        let state = AppState::fake();
        let user = verified(&state).await;

        // Mint a second record by hand; the flow-level guard is what we
        // want to hit, not the missing-record path.
        let issued = state.tokens.sign_email_verification(user.id).expect("sign");
        let mut tx = state.store.begin().await;
        verification::create(&mut tx, user.id, &issued.token, issued.expires_at);
        tx.commit();

        let err = verify_email(&state, &issued.token).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyVerified));
    }

    #[tokio::test]
    async fn login_fails_uniformly_on_bad_email_or_password() {
        let state = AppState::fake();
        verified(&state).await;

        let unknown = login(&state, "nobody@example.com", "password123").await.unwrap_err();
        assert!(matches!(unknown, Error::InvalidCredentials));

        let wrong = login(&state, "user@example.com", "wrong-password").await.unwrap_err();
        assert!(matches!(wrong, Error::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_unverified_with_live_record_does_not_resend() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::fake_with_mailer(mailer.clone());
        let (user, token) = registered(&state).await;

        let err = login(&state, "user@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, Error::EmailNotVerified { resent: false }));

        // Only the registration email went out and the record is unchanged.
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
        let mut tx = state.store.begin().await;
        let records = tx.verifications().filter(|v| v.user_id == user.id);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].token, token);
        tx.abort();
    }

    #[tokio::test]
    async fn login_unverified_with_stale_record_mints_and_commits_a_new_one() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::fake_with_mailer(mailer.clone());
        let (user, _) = registered(&state).await;
        let stale_token = expire_records(&state, user.id).await;

        let err = login(&state, "user@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, Error::EmailNotVerified { resent: true }));

        assert_eq!(mailer.sent.lock().unwrap().len(), 2);

        // The stale record was replaced and the fresh one survived the
        // error return; never more than one live record per user.
        let now = OffsetDateTime::now_utc();
        let mut tx = state.store.begin().await;
        let records = tx.verifications().filter(|v| v.user_id == user.id);
        assert_eq!(records.len(), 1);
        assert_ne!(records[0].token, stale_token);
        assert!(!records[0].is_expired(now));
        tx.abort();
    }

    #[tokio::test]
    async fn login_issues_audience_scoped_tokens_and_sets_last_login() {
        let state = AppState::fake();
        verified(&state).await;

        let auth = login(&state, "user@example.com", "password123").await.expect("login");
        assert!(auth.user.last_login.is_some());

        let access = state.tokens.verify(&auth.access_token, Audience::Access).expect("access");
        assert_eq!(access.sub, auth.user.id);
        state
            .tokens
            .verify(&auth.refresh_token, Audience::Refresh)
            .expect("refresh");

        // Cross-audience use is rejected outright.
        let err = state.tokens.verify(&auth.refresh_token, Audience::Access).unwrap_err();
        assert!(matches!(err, Error::TokenInvalid));
    }

    #[tokio::test]
    async fn refresh_renews_access_only() {
        let state = AppState::fake();
        verified(&state).await;
        let auth = login(&state, "user@example.com", "password123").await.expect("login");

        let renewed = refresh(&state, &auth.refresh_token).await.expect("refresh");
        state
            .tokens
            .verify(&renewed.access_token, Audience::Access)
            .expect("new access token");

        // An access token is no substitute for a refresh token.
        let err = refresh(&state, &auth.access_token).await.unwrap_err();
        assert!(matches!(err, Error::TokenInvalid));
    }

    #[tokio::test]
    async fn refresh_for_deleted_user_is_not_found() {
        let state = AppState::fake();
        let ghost = state.tokens.sign_refresh(Uuid::new_v4()).expect("sign");
        let err = refresh(&state, &ghost.token).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn reset_request_requires_verified_email() {
        let state = AppState::fake();
        registered(&state).await;
        let err = request_password_reset(&state, "user@example.com").await.unwrap_err();
        assert!(matches!(err, Error::EmailNotVerified { .. }));
    }

    #[tokio::test]
    async fn reset_request_conflicts_while_one_is_pending() {
        let state = AppState::fake();
        verified(&state).await;

        request_password_reset(&state, "user@example.com").await.expect("first request");
        let err = request_password_reset(&state, "user@example.com").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn reset_password_changes_credentials_and_purges_records() {
        let state = AppState::fake();
        let user = verified(&state).await;
        request_password_reset(&state, "user@example.com").await.expect("request");

        let mut tx = state.store.begin().await;
        let record = tx
            .verifications()
            .find(|v| v.user_id == user.id)
            .expect("reset record");
        tx.abort();

        reset_password(&state, &record.token, "fresh-password", "fresh-password")
            .await
            .expect("reset");

        let old = login(&state, "user@example.com", "password123").await.unwrap_err();
        assert!(matches!(old, Error::InvalidCredentials));
        login(&state, "user@example.com", "fresh-password").await.expect("new password");

        let mut tx = state.store.begin().await;
        assert!(tx.verifications().filter(|v| v.user_id == user.id).is_empty());
        tx.abort();
    }

    #[tokio::test]
    async fn reset_password_mismatch_changes_nothing() {
        let state = AppState::fake();
        let user = verified(&state).await;
        request_password_reset(&state, "user@example.com").await.expect("request");

        let mut tx = state.store.begin().await;
        let record = tx
            .verifications()
            .find(|v| v.user_id == user.id)
            .expect("record");
        tx.abort();

        let err = reset_password(&state, &record.token, "fresh-password", "different-password")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PasswordMismatch));

        login(&state, "user@example.com", "password123").await.expect("old password still valid");
    }

    #[tokio::test]
    async fn reset_token_does_not_verify_email() {
        let state = AppState::fake();
        let user = verified(&state).await;
        let reset = state.tokens.sign_password_reset(user.id).expect("sign");

        let err = verify_email(&state, &reset.token).await.unwrap_err();
        assert!(matches!(err, Error::TokenInvalid));
    }
}
