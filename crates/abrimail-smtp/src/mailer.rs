//! One-shot message submission.

use abrimail_transport::{ConnectionSettings, LineStream};
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::message::OutgoingMessage;

/// EHLO argument used unless overridden.
pub const DEFAULT_CLIENT_DOMAIN: &str = "localhost";

/// Sends messages, opening a fresh connection for each one.
#[derive(Debug, Clone)]
pub struct Mailer {
    settings: ConnectionSettings,
    client_domain: String,
}

impl Mailer {
    /// Creates a mailer. No network activity happens here.
    #[must_use]
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            client_domain: DEFAULT_CLIENT_DOMAIN.to_string(),
        }
    }

    /// Sets the domain announced in EHLO.
    #[must_use]
    pub fn with_client_domain(mut self, domain: impl Into<String>) -> Self {
        self.client_domain = domain.into();
        self
    }

    /// Settings used for every send.
    #[must_use]
    pub const fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Validates, connects, authenticates and submits `message`.
    ///
    /// The message and settings are checked before any socket is opened.
    ///
    /// # Errors
    ///
    /// Validation errors, transport errors, or [`crate::Error::Submission`]
    /// naming the step the server rejected.
    pub async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        message.compose(Utc::now())?;
        self.settings
            .validate()
            .map_err(abrimail_transport::Error::from)?;

        let stream = abrimail_transport::open(&self.settings).await?;
        self.send_over(stream, message).await
    }

    /// Runs the submission sequence over an already open stream.
    ///
    /// # Errors
    ///
    /// As for [`Mailer::send`].
    pub async fn send_over<S>(&self, stream: LineStream<S>, message: &OutgoingMessage) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let envelope = message.envelope()?;
        let content = message.compose(Utc::now())?;

        let client = Client::greet(stream).await?;
        let client = client.ehlo(&self.client_domain).await?;
        let client = client
            .auth_login(&self.settings.username, &self.settings.password)
            .await?;
        let client = client.mail_from(&envelope.sender).await?;

        let Some((first, rest)) = envelope.recipients.split_first() else {
            return Err(Error::InvalidMessage("no recipients".to_string()));
        };
        let mut client = client.rcpt_to(first).await?;
        for recipient in rest {
            client = client.rcpt_to(recipient).await?;
        }

        let client = client.data(&content).await?;
        client.quit().await?;

        info!(
            from = %envelope.sender,
            recipients = envelope.recipients.len(),
            "message sent"
        );

        Ok(())
    }
}
