use async_trait::async_trait;
use lettre::message::{header::ContentType, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{info, warn};

use common::{EmailConfig, Error, Notifier, Result, Urgency};

/// Sends notifications as plain-text email over an SMTP relay (STARTTLS).
///
/// The channel is only enabled when the flag is set and host, user,
/// password and recipient are all configured.
pub struct EmailNotifier {
    enabled: bool,
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
    to: String,
}

impl EmailNotifier {
    pub fn new(host: &str, user: &str, pass: &str, to: &str) -> Result<Self> {
        let creds = Credentials::new(user.to_string(), pass.to_string());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| Error::Config(format!("invalid SMTP host '{host}': {e}")))?
            .credentials(creds)
            .build();

        Ok(Self {
            enabled: true,
            mailer: Some(mailer),
            from: user.to_string(),
            to: to.to_string(),
        })
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            mailer: None,
            from: String::new(),
            to: String::new(),
        }
    }

    pub fn from_config(cfg: &EmailConfig) -> Result<Self> {
        if !cfg.enabled {
            return Ok(Self::disabled());
        }
        match (&cfg.smtp_host, &cfg.smtp_user, &cfg.smtp_pass, &cfg.to) {
            (Some(host), Some(user), Some(pass), Some(to)) => Self::new(host, user, pass, to),
            _ => {
                warn!("Email notification enabled but SMTP settings are incomplete; channel disabled");
                Ok(Self::disabled())
            }
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    fn is_enabled(&self) -> bool {
        self.enabled && self.mailer.is_some()
    }

    async fn send(&self, title: &str, body: &str, _urgency: Urgency) -> Result<()> {
        let Some(mailer) = &self.mailer else {
            return Ok(());
        };

        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| Error::Config(format!("invalid from address: {e}")))?,
            )
            .to(self
                .to
                .parse()
                .map_err(|e| Error::Config(format!("invalid to address: {e}")))?)
            .subject(title)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::Notify(format!("failed to build email: {e}")))?;

        mailer
            .send(email)
            .await
            .map_err(|e| Error::Notify(format!("SMTP error: {e}")))?;

        info!(subject = %title, "Email sent");
        Ok(())
    }
}
