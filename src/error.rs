use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

/// Service-level error taxonomy. Handlers never build status codes by hand;
/// the `IntoResponse` impl below is the single place kinds become HTTP.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    /// Uniform for unknown email and wrong password, to avoid user enumeration.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{}", email_not_verified_message(.resent))]
    EmailNotVerified { resent: bool },

    #[error("invalid token")]
    TokenInvalid,

    #[error("token expired")]
    TokenExpired,

    #[error("email is already verified")]
    AlreadyVerified,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("{0}")]
    Conflict(String),

    #[error("failed to send email")]
    EmailDispatch(#[source] anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn email_not_verified_message(resent: &bool) -> &'static str {
    if *resent {
        "email not verified; a new verification link has been sent to your email"
    } else {
        "email not verified; please check your email for the verification link"
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) | Error::EmailNotVerified { .. } => StatusCode::FORBIDDEN,
            Error::InvalidCredentials | Error::TokenInvalid | Error::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            Error::AlreadyVerified | Error::PasswordMismatch | Error::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Error::EmailDispatch(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            // Internal details stay in the logs, not in the body.
            Error::Internal(e) => {
                error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            Error::EmailDispatch(e) => {
                error!(error = %e, "email dispatch failed");
                self.to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(Error::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::NotFound("task").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::Forbidden("not a member of this project").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(Error::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::TokenInvalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::AlreadyVerified.status(), StatusCode::CONFLICT);
        assert_eq!(Error::Conflict("pending".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            Error::EmailNotVerified { resent: true }.status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn not_found_names_the_resource() {
        assert_eq!(Error::NotFound("workspace").to_string(), "workspace not found");
    }

    #[test]
    fn email_not_verified_message_depends_on_resend() {
        let resent = Error::EmailNotVerified { resent: true }.to_string();
        let pending = Error::EmailNotVerified { resent: false }.to_string();
        assert!(resent.contains("new verification link"));
        assert!(pending.contains("check your email"));
        assert_ne!(resent, pending);
    }
}
