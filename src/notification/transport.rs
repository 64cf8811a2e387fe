//! Email transports.
//!
//! `SmtpTransport` delivers through an SMTP relay using `lettre`.
//! `OutboxTransport` writes each message as a JSON file instead, for dry runs
//! and hosts without mail access.

use crate::config::{EmailConfig, EmailSecurity};
use crate::core::{EmailMessage, EmailTransport};
use anyhow::Result;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MessageBuilder};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid email address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build email: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("SMTP server at {0} rejected the connection test")]
    Unreachable(String),

    #[error("outbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize email: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Sends email through an SMTP server.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    endpoint: String,
}

impl SmtpTransport {
    pub fn from_config(config: &EmailConfig) -> Result<Self, TransportError> {
        let server = config.smtp_server.as_str();
        let builder = match config.security {
            EmailSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server),
            EmailSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)?
            }
            EmailSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(server)?,
        };

        let mut builder = builder
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));
        if !config.sender_password.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.sender_email.clone(),
                config.sender_password.clone(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
            sender: mailbox(Some(config.sender_name.as_str()), &config.sender_email)?,
            endpoint: format!("{}:{}", config.smtp_server, config.smtp_port),
        })
    }

    fn build_message(&self, message: &EmailMessage) -> Result<Message, TransportError> {
        let mut builder: MessageBuilder = Message::builder()
            .from(self.sender.clone())
            .subject(message.subject.clone())
            .date(message.created_at.into());
        for recipient in &message.recipients {
            builder = builder.to(mailbox(None, recipient)?);
        }
        let content_type = if message.is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };
        builder
            .header(content_type)
            .body(message.body.clone())
            .map_err(|e| TransportError::Build(e.to_string()))
    }
}

fn mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, TransportError> {
    let parsed = address.parse().map_err(|e: lettre::address::AddressError| {
        TransportError::Address {
            address: address.to_string(),
            reason: e.to_string(),
        }
    })?;
    let name = name.filter(|n| !n.is_empty()).map(str::to_string);
    Ok(Mailbox::new(name, parsed))
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let email = self.build_message(message)?;
        let response = self.mailer.send(email).await.map_err(TransportError::from)?;
        debug!(endpoint = %self.endpoint, code = %response.code(), "SMTP server accepted message");
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        let reachable = self
            .mailer
            .test_connection()
            .await
            .map_err(TransportError::from)?;
        if !reachable {
            return Err(TransportError::Unreachable(self.endpoint.clone()).into());
        }
        Ok(())
    }
}

/// Writes each email to `<dir>/<timestamp>-<seq>.json`.
pub struct OutboxTransport {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl OutboxTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl EmailTransport for OutboxTransport {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(TransportError::from)?;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let file_name = format!(
            "{}-{:04}.json",
            message.created_at.format("%Y%m%dT%H%M%S%.3f"),
            seq
        );
        let payload = serde_json::to_vec_pretty(message).map_err(TransportError::from)?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, payload)
            .await
            .map_err(TransportError::from)?;
        debug!(path = %path.display(), "Wrote email to outbox");
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(TransportError::from)?;
        Ok(())
    }
}
