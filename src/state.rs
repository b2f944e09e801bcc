use std::sync::Arc;

use crate::activity::ActivityRecorder;
use crate::auth::token::TokenIssuer;
use crate::config::AppConfig;
use crate::mailer::{LogMailer, Mailer};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub activity: ActivityRecorder,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: TokenIssuer,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let mailer = Arc::new(LogMailer {
            sender: config.mail_sender.clone(),
        }) as Arc<dyn Mailer>;
        Ok(Self::from_parts(Store::new(), mailer, config))
    }

    pub fn from_parts(store: Store, mailer: Arc<dyn Mailer>, config: Arc<AppConfig>) -> Self {
        Self {
            store,
            activity: ActivityRecorder::new(),
            mailer,
            tokens: TokenIssuer::new(&config.jwt),
            config,
        }
    }

    pub fn fake() -> Self {
        Self::fake_with_mailer(Arc::new(LogMailer {
            sender: "Trackspace <no-reply@trackspace.local>".into(),
        }))
    }

    pub fn fake_with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        let config = Arc::new(AppConfig {
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                access_ttl_minutes: 15,
                refresh_ttl_days: 7,
                verification_ttl_minutes: 60,
            },
            frontend_url: "http://localhost:5173".into(),
            mail_sender: "Trackspace <no-reply@trackspace.local>".into(),
            invite_ttl_days: 7,
        });
        Self::from_parts(Store::new(), mailer, config)
    }
}
