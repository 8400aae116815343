/// Mail plugin: account notifications over an SMTP relay
use crate::config::EmailSettings;
use crate::error::{IdentityError, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::sync::Arc;
use tracing::{info, warn};

/// A fully rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Outbound mail transport
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// Async SMTP transport wrapper (SMTP or no-op)
#[derive(Clone)]
pub struct EmailService {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Mailbox,
}

impl EmailService {
    /// Build the transport from configuration
    ///
    /// An empty SMTP host runs in no-op mode: messages are logged, not sent.
    pub fn new(config: &EmailSettings) -> Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| IdentityError::Internal(format!("Invalid MAIL_FROM address: {}", e)))?;

        let transport = if config.smtp_host.trim().is_empty() {
            warn!("SMTP host not configured; email service will operate in no-op mode");
            None
        } else {
            let builder = if config.use_starttls {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            }
            .map_err(|e| {
                IdentityError::Internal(format!("Failed to configure SMTP transport: {}", e))
            })?
            .port(config.smtp_port);

            let builder = match (&config.smtp_username, &config.smtp_password) {
                (Some(username), Some(password)) => {
                    builder.credentials(Credentials::new(username.clone(), password.clone()))
                }
                _ => builder,
            };

            Some(Arc::new(builder.build()))
        };

        Ok(Self { transport, from })
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let Some(transport) = &self.transport else {
            info!(
                subject = %mail.subject,
                recipient = %mail.to,
                "Email service running in no-op mode; skipping actual send"
            );
            return Ok(());
        };

        let to = mail
            .to
            .parse::<Mailbox>()
            .map_err(|e| IdentityError::Mail(format!("Invalid recipient email address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(mail.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(mail.html),
                    ),
            )
            .map_err(|e| IdentityError::Mail(format!("Failed to build email message: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| IdentityError::Mail(format!("Failed to send email: {}", e)))?;
        info!(subject = %mail.subject, "email sent successfully");
        Ok(())
    }
}

/// Renders and sends the account lifecycle messages
#[derive(Clone)]
pub struct AccountMailer {
    mailer: Arc<dyn Mailer>,
    site_name: String,
    url: String,
}

impl AccountMailer {
    pub fn new(mailer: Arc<dyn Mailer>, site_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            mailer,
            site_name: site_name.into(),
            url: url.into(),
        }
    }

    pub fn from_settings(mailer: Arc<dyn Mailer>, settings: &EmailSettings) -> Self {
        Self::new(mailer, settings.site_name.clone(), settings.url.clone())
    }

    fn link(&self, page: &str, user_id: &str, token: &str) -> String {
        format!(
            "{}/{}?userId={}&token={}",
            self.url,
            page,
            urlencoding::encode(user_id),
            urlencoding::encode(token)
        )
    }

    pub async fn send_welcome(&self, to: &str, user_id: &str, token: &str) -> Result<()> {
        let link = self.link("verify-email", user_id, token);
        self.mailer
            .send(OutgoingMail {
                to: to.to_string(),
                subject: format!("Welcome to {}", self.site_name),
                text: format!(
                    "Thank you for joining {}.\n\nPlease verify your email address:\n{}\n",
                    self.site_name, link
                ),
                html: format!(
                    "<p>Thank you for joining {}.</p><p><a href=\"{}\">Verify your email address</a></p>",
                    self.site_name, link
                ),
            })
            .await
    }

    pub async fn send_verification(&self, to: &str, user_id: &str, token: &str) -> Result<()> {
        let link = self.link("verify-email", user_id, token);
        self.mailer
            .send(OutgoingMail {
                to: to.to_string(),
                subject: format!("Verify your {} email address", self.site_name),
                text: format!("Please verify your email address:\n{}\n", link),
                html: format!("<p><a href=\"{}\">Verify your email address</a></p>", link),
            })
            .await
    }

    pub async fn send_verified(&self, to: &str) -> Result<()> {
        self.mailer
            .send(OutgoingMail {
                to: to.to_string(),
                subject: "Address verified".to_string(),
                text: format!("Your {} email address has been verified.\n", self.site_name),
                html: format!("<p>Your {} email address has been verified.</p>", self.site_name),
            })
            .await
    }

    pub async fn send_password_reset(&self, to: &str, user_id: &str, token: &str) -> Result<()> {
        let link = self.link("reset-password", user_id, token);
        self.mailer
            .send(OutgoingMail {
                to: to.to_string(),
                subject: format!("{} password reset", self.site_name),
                text: format!(
                    "Reset your password:\n{}\n\nThis link will expire in 1 hour.\nIf you did not request this, please ignore this email.\n",
                    link
                ),
                html: format!(
                    "<p><a href=\"{}\">Reset your password</a></p><p>This link will expire in 1 hour.</p>",
                    link
                ),
            })
            .await
    }

    pub async fn send_password_changed(&self, to: &str) -> Result<()> {
        self.mailer
            .send(OutgoingMail {
                to: to.to_string(),
                subject: "Password changed".to_string(),
                text: format!("Your {} password has been changed.\n", self.site_name),
                html: format!("<p>Your {} password has been changed.</p>", self.site_name),
            })
            .await
    }
}
