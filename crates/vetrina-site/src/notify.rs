//! Outgoing contact-mail construction and dispatch.
//!
//! Invoked only for submissions the spam gate accepted. One delivery
//! attempt per submission; every transport failure is captured as a
//! [`DispatchOutcome::Failed`] value and never propagates further.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;

/// Upper bound on one SMTP delivery attempt.
const MAIL_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed(String),
}

/// Mail transport boundary. Tests substitute recording or failing
/// implementations.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: Message) -> anyhow::Result<()>;
}

/// SMTP transport over implicit TLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.mail_server)?
            .port(config.mail_port)
            .credentials(Credentials::new(
                config.mail_username.clone(),
                config.mail_password.clone(),
            ))
            .timeout(Some(MAIL_TIMEOUT))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: Message) -> anyhow::Result<()> {
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Builds the contact-mail envelope and hands it to the mail transport.
pub struct Notifier {
    config: Arc<Config>,
    mailer: Arc<dyn Mailer>,
}

impl Notifier {
    pub fn new(config: Arc<Config>, mailer: Arc<dyn Mailer>) -> Self {
        Self { config, mailer }
    }

    /// Send one contact message. When email sending is disabled by
    /// configuration this is a no-op reported as [`DispatchOutcome::Sent`].
    pub async fn dispatch(
        &self,
        subject: &str,
        message: &str,
        remote_addr: &str,
    ) -> DispatchOutcome {
        if !self.config.email_send {
            tracing::debug!("email sending disabled, skipping dispatch");
            return DispatchOutcome::Sent;
        }

        match self.try_send(subject, message, remote_addr).await {
            Ok(()) => {
                tracing::info!(%remote_addr, "contact mail dispatched");
                DispatchOutcome::Sent
            }
            Err(err) => {
                tracing::warn!(%remote_addr, error = %err, "contact mail dispatch failed");
                DispatchOutcome::Failed(err.to_string())
            }
        }
    }

    async fn try_send(
        &self,
        subject: &str,
        message: &str,
        remote_addr: &str,
    ) -> anyhow::Result<()> {
        let envelope = self.build_message(subject, message, remote_addr)?;
        self.mailer.send(envelope).await
    }

    fn build_message(
        &self,
        subject: &str,
        message: &str,
        remote_addr: &str,
    ) -> anyhow::Result<Message> {
        let from = Mailbox::new(
            Some(self.config.website.clone()),
            self.config.email_sender.parse()?,
        );
        let to = Mailbox::new(
            Some(self.config.email_dest_name.clone()),
            self.config.email_dest.parse()?,
        );

        let envelope = Message::builder()
            .from(from)
            .to(to)
            .subject(format!("Website message: {subject}"))
            .body(format!("IP:{remote_addr}\n\n{message}"))?;

        Ok(envelope)
    }
}
