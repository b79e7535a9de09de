use anyhow::{Result, anyhow};
use async_trait::async_trait;
use compute::notify::{Notification, Notifier, NotifyError, Recipient};
use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, info};

use super::templates::render;
use crate::config::SmtpConfig;

/// Sends notifications through an SMTP relay.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| anyhow!("Invalid from address '{}': {e}", config.from))?;

        let transport = if config.username.is_empty() {
            SmtpTransport::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        } else {
            SmtpTransport::relay(&config.host)
                .map_err(|e| anyhow!("SMTP relay error: {e}"))?
                .port(config.port)
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build()
        };

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(
        &self,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let to: Mailbox = recipient
            .email
            .parse()
            .map_err(|e| NotifyError::Address(format!("{}: {e}", recipient.email)))?;
        let mail = render(recipient, notification);

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html)
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        info!(template = notification.template(), email = %recipient.email, "Email sent");
        Ok(())
    }
}

/// Used when no SMTP host is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let mail = render(recipient, notification);
        info!(
            template = notification.template(),
            email = %recipient.email,
            subject = %mail.subject,
            "Email delivery disabled, notification logged"
        );
        debug!(html = %mail.html);
        Ok(())
    }
}
