//! SMTP delivery through lettre's async transport.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::{EmailMessage, Notifier, NotifyError, Result};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS (usually port 465). Otherwise STARTTLS is used.
    pub secure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            secure: false,
            username: None,
            password: None,
            from_address: "noreply@offgrid.com".to_string(),
            from_name: "OffGrid".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| NotifyError::Transport(format!("SMTP relay error: {e}")))?;

        let mut builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::Address(format!("invalid from address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, message: &EmailMessage) -> Result<Message> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::Address(format!("invalid to address: {e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[tracing::instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let email = self.build_message(message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Paid Table Registration - OffGrid".to_string(),
            text: "Hi Ada".to_string(),
            html: "<p>Hi Ada</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn builds_multipart_message() {
        let notifier = SmtpNotifier::new(&SmtpConfig::new("smtp.example.com")).unwrap();
        let built = notifier.build_message(&message("ada@example.com")).unwrap();
        let raw = String::from_utf8(built.formatted()).unwrap();
        assert!(raw.contains("Subject: Paid Table Registration - OffGrid"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[tokio::test]
    async fn bad_recipient_is_not_retryable() {
        let notifier = SmtpNotifier::new(&SmtpConfig::new("smtp.example.com")).unwrap();
        let err = notifier.build_message(&message("not an address")).unwrap_err();
        assert!(matches!(err, NotifyError::Address(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn bad_from_address_is_rejected() {
        let mut config = SmtpConfig::new("smtp.example.com");
        config.from_address = "nope".to_string();
        assert!(matches!(
            SmtpNotifier::new(&config),
            Err(NotifyError::Address(_))
        ));
    }
}
