use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{Error, Result};

/// Purpose a token may authenticate. Every token carries exactly one
/// audience; verification pins the expected one, so a reset-password token
/// can never pass as an access token even though both share the secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Access,
    Refresh,
    EmailVerification,
    ResetPassword,
}

impl Audience {
    pub fn claim(self) -> &'static str {
        match self {
            Audience::Access => "access",
            Audience::Refresh => "refresh",
            Audience::EmailVerification => "email-verification",
            Audience::ResetPassword => "reset-password",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Signs and verifies audience-scoped tokens with one shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    verification_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_ttl_days),
            verification_ttl: Duration::minutes(config.verification_ttl_minutes),
        }
    }

    pub fn issue(&self, user_id: Uuid, audience: Audience, ttl: Duration) -> anyhow::Result<IssuedToken> {
        self.issue_at(user_id, audience, ttl, OffsetDateTime::now_utc())
    }

    // Tests mint already-lapsed tokens through this.
    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        audience: Audience,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> anyhow::Result<IssuedToken> {
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: expires_at.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: audience.claim().to_string(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, audience = audience.claim(), "token signed");
        Ok(IssuedToken { token, expires_at })
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<IssuedToken> {
        self.issue(user_id, Audience::Access, self.access_ttl)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<IssuedToken> {
        self.issue(user_id, Audience::Refresh, self.refresh_ttl)
    }

    pub fn sign_email_verification(&self, user_id: Uuid) -> anyhow::Result<IssuedToken> {
        self.issue(user_id, Audience::EmailVerification, self.verification_ttl)
    }

    pub fn sign_password_reset(&self, user_id: Uuid) -> anyhow::Result<IssuedToken> {
        self.issue(user_id, Audience::ResetPassword, self.verification_ttl)
    }

    /// `TokenExpired` only for a well-signed token past its exp; anything
    /// else, wrong audience and wrong issuer included, is `TokenInvalid`.
    pub fn verify(&self, token: &str, expected: Audience) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(&[expected.claim()]);
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => Error::TokenExpired,
                _ => Error::TokenInvalid,
            }
        })?;
        debug!(user_id = %data.claims.sub, audience = expected.claim(), "token verified");
        Ok(data.claims)
    }
}
