//! Outgoing email
//!
//! `SmtpMailer` delivers through an SMTP relay with lettre. Without an SMTP
//! host, `LogMailer` writes the message to the log instead.

use crate::config::EmailConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

/// A rendered HTML email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

pub type DynMailer = Arc<dyn Mailer>;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig, host: &str) -> Result<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .credentials(creds)
            .port(config.smtp_port)
            .build();

        Ok(Self {
            transport,
            from: format!("{} <{}>", config.from_name, config.from),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(email.to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

/// Logs messages instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "SMTP not configured, email not sent:\n{}",
            email.html_body
        );
        Ok(())
    }
}

/// Pick the SMTP mailer when a host is configured
pub fn mailer_from_config(config: &EmailConfig) -> Result<DynMailer> {
    match config.smtp_host.as_deref().filter(|h| !h.is_empty()) {
        Some(host) => Ok(Arc::new(SmtpMailer::new(config, host)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

/// Builds the activation and password reset messages
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    site_domain: String,
    reset_domain: String,
}

impl EmailTemplates {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            site_domain: config.site_domain.clone(),
            reset_domain: config.reset_domain.trim_end_matches('/').to_string(),
        }
    }

    pub fn activation_link(&self, token: &str) -> String {
        format!("http://{}/api/users/activate/{}", self.site_domain, token)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/api/users/reset_password/{}", self.reset_domain, token)
    }

    pub fn activation(&self, to: &str, username: &str, token: &str) -> OutgoingEmail {
        let link = self.activation_link(token);
        OutgoingEmail {
            to: to.to_string(),
            subject: "Activate Authors' Haven account.".to_string(),
            html_body: format!(
                "<p>Hi {username},</p>\
                 <p>Please click on the link below to confirm your registration.</p>\
                 <p><a href=\"{link}\">{link}</a></p>\
                 <p>Authors' Haven</p>"
            ),
        }
    }

    pub fn password_reset(&self, to: &str, username: &str, token: &str) -> OutgoingEmail {
        let link = self.reset_link(token);
        OutgoingEmail {
            to: to.to_string(),
            subject: "Confirmation of Password reset".to_string(),
            html_body: format!(
                "<p>Hi {username},</p>\
                 <p>Follow the link below to reset your password.</p>\
                 <p><a href=\"{link}\">{link}</a></p>\
                 <p>If you did not request a reset you can ignore this email.</p>"
            ),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn templates() -> EmailTemplates {
        EmailTemplates::new(&EmailConfig {
            site_domain: "example.org".to_string(),
            reset_domain: "https://front.example.org/".to_string(),
            ..EmailConfig::default()
        })
    }

    #[test]
    fn test_activation_message() {
        let email = templates().activation("jake@jake.jake", "jake", "abc.def.ghi");
        assert_eq!(email.subject, "Activate Authors' Haven account.");
        assert!(email
            .html_body
            .contains("http://example.org/api/users/activate/abc.def.ghi"));
        assert_eq!(
            token_from_link(&email, "/api/users/activate/").as_deref(),
            Some("abc.def.ghi")
        );
    }

    #[test]
    fn test_reset_message() {
        let email = templates().password_reset("jake@jake.jake", "jake", "k3-ff00");
        assert_eq!(email.subject, "Confirmation of Password reset");
        assert!(email
            .html_body
            .contains("https://front.example.org/api/users/reset_password/k3-ff00"));
    }

    #[test]
    fn test_log_mailer_without_smtp_host() {
        let config = EmailConfig::default();
        assert!(mailer_from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_log_mailer_succeeds() {
        let email = templates().activation("a@b.co", "a", "t");
        assert!(LogMailer.send(email).await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_mailer() {
        let mailer = RecordingMailer::default();
        mailer
            .send(templates().activation("a@b.co", "a", "t"))
            .await
            .unwrap();
        assert_eq!(mailer.sent().await.len(), 1);
        assert_eq!(mailer.last().await.unwrap().to, "a@b.co");
    }
}
