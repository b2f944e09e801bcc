use async_trait::async_trait;
use tracing::info;

use crate::config::AppConfig;
use crate::models::User;

/// Outbound-email capability. Transport lives behind this seam; the service
/// only ever needs send-or-fail semantics.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text: &str, html: &str) -> anyhow::Result<()>;
}

/// Development transport: writes the message to the log instead of a wire.
pub struct LogMailer {
    pub sender: String,
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, text: &str, _html: &str) -> anyhow::Result<()> {
        info!(from = %self.sender, to, subject, body = text, "email dispatched");
        Ok(())
    }
}

pub async fn deliver_verification(
    mailer: &dyn Mailer,
    config: &AppConfig,
    user: &User,
    token: &str,
) -> anyhow::Result<()> {
    let link = format!("{}/verify-email?token={}", config.frontend_url, token);
    let text = format!(
        "Hi {},\n\nConfirm your email address by opening the link below:\n\n{}\n\n\
         The link expires in one hour. If you didn't create an account, ignore this email.",
        user.name, link
    );
    let html = format!(
        "<p>Hi <strong>{}</strong>,</p>\
         <p>Confirm your email address by opening <a href=\"{link}\">{link}</a>.</p>\
         <p>The link expires in one hour. If you didn't create an account, ignore this email.</p>",
        user.name
    );
    mailer.send(&user.email, "Verify your email", &text, &html).await
}

pub async fn deliver_password_reset(
    mailer: &dyn Mailer,
    config: &AppConfig,
    user: &User,
    token: &str,
) -> anyhow::Result<()> {
    let link = format!("{}/reset-password?token={}", config.frontend_url, token);
    let text = format!(
        "Hi {},\n\nReset your password by opening the link below:\n\n{}\n\n\
         The link expires in one hour. If you didn't request a reset, ignore this email.",
        user.name, link
    );
    let html = format!(
        "<p>Hi <strong>{}</strong>,</p>\
         <p>Reset your password by opening <a href=\"{link}\">{link}</a>.</p>\
         <p>The link expires in one hour. If you didn't request a reset, ignore this email.</p>",
        user.name
    );
    mailer.send(&user.email, "Reset your password", &text, &html).await
}

pub async fn deliver_invite(
    mailer: &dyn Mailer,
    config: &AppConfig,
    invitee: &User,
    inviter_name: &str,
    workspace_name: &str,
    token: &str,
) -> anyhow::Result<()> {
    let link = format!("{}/accept-invite?token={}", config.frontend_url, token);
    let subject = format!("You're invited to join {workspace_name}");
    let text = format!(
        "Hi {},\n\n{} has invited you to join the \"{}\" workspace.\n\n\
         Join by opening the link below:\n\n{}\n\n\
         If you weren't expecting this invitation, ignore this email.",
        invitee.name, inviter_name, workspace_name, link
    );
    let html = format!(
        "<p>Hi <strong>{}</strong>,</p>\
         <p><strong>{}</strong> has invited you to join the <strong>{}</strong> workspace.</p>\
         <p><a href=\"{link}\">Join workspace</a></p>\
         <p>If you weren't expecting this invitation, ignore this email.</p>",
        invitee.name, inviter_name, workspace_name
    );
    mailer.send(&invitee.email, &subject, &text, &html).await
}
