use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub verification_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub frontend_url: String,
    pub mail_sender: String,
    pub invite_ttl_days: i64,
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "trackspace".into()),
            access_ttl_minutes: env_i64("JWT_ACCESS_TTL_MINUTES", 15),
            refresh_ttl_days: env_i64("JWT_REFRESH_TTL_DAYS", 7),
            verification_ttl_minutes: env_i64("VERIFICATION_TTL_MINUTES", 60),
        };
        Ok(Self {
            jwt,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            mail_sender: std::env::var("MAIL_SENDER")
                .unwrap_or_else(|_| "Trackspace <no-reply@trackspace.local>".into()),
            invite_ttl_days: env_i64("INVITE_TTL_DAYS", 7),
        })
    }
}
