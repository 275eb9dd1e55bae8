//! Type-state SMTP client.
//!
//! Each step consumes the client and returns it in the next state, so the
//! compiler rejects out-of-order commands and a failed step leaves nothing
//! to resume: the stream is dropped with the client.

use std::marker::PhantomData;

use abrimail_transport::LineStream;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::address::Address;
use crate::error::{Error, Result, Step};
use crate::message::encode_data;
use crate::reply::{Reply, ReplyCode, is_last_reply_line, parse_reply};

/// Replies longer than this many lines are treated as malformed.
const MAX_REPLY_LINES: usize = 512;

/// Type-state marker: greeting accepted.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: EHLO accepted.
#[derive(Debug)]
pub struct Capable;

/// Type-state marker: AUTH LOGIN accepted.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker: MAIL FROM accepted.
#[derive(Debug)]
pub struct SenderDeclared;

/// Type-state marker: at least one RCPT TO accepted.
#[derive(Debug)]
pub struct RecipientDeclared;

/// Type-state marker: message accepted for delivery.
#[derive(Debug)]
pub struct Delivered;

/// SMTP client with type-state pattern.
pub struct Client<S, State> {
    stream: LineStream<S>,
    capabilities: Vec<String>,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the server greeting, which must be `220`.
    ///
    /// # Errors
    ///
    /// Transport errors, or [`Error::Submission`] at [`Step::Greeting`].
    pub async fn greet(mut stream: LineStream<S>) -> Result<Self> {
        let greeting = read_reply(&mut stream, Step::Greeting).await?;
        expect(Step::Greeting, &greeting, &[ReplyCode::SERVICE_READY])?;
        debug!(greeting = %greeting, "greeting accepted");

        Ok(Self {
            stream,
            capabilities: Vec::new(),
            _state: PhantomData,
        })
    }

    /// Sends `EHLO` and records the advertised capabilities.
    ///
    /// # Errors
    ///
    /// [`Error::Submission`] at [`Step::CapabilityExchange`] unless `250`.
    pub async fn ehlo(mut self, client_domain: &str) -> Result<Client<S, Capable>> {
        if client_domain.is_empty() || client_domain.contains(['\r', '\n', ' ']) {
            return Err(Error::InvalidMessage(format!(
                "invalid client domain: {client_domain:?}"
            )));
        }

        let reply = self
            .command(
                Step::CapabilityExchange,
                &format!("EHLO {client_domain}"),
                None,
            )
            .await?;
        expect(Step::CapabilityExchange, &reply, &[ReplyCode::OK])?;

        // First line is the server's greeting text.
        let capabilities = reply.message.into_iter().skip(1).collect();

        Ok(self.into_state(capabilities))
    }
}

impl<S> Client<S, Capable>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Authenticates with `AUTH LOGIN`: base64 username, then password.
    ///
    /// # Errors
    ///
    /// [`Error::Submission`] at [`Step::Authenticate`] unless the server
    /// answers `334`, `334`, `235`.
    pub async fn auth_login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let reply = self.command(Step::Authenticate, "AUTH LOGIN", None).await?;
        expect(Step::Authenticate, &reply, &[ReplyCode::AUTH_CONTINUE])?;

        let reply = self
            .command(
                Step::Authenticate,
                &STANDARD.encode(username.as_bytes()),
                Some("<username>"),
            )
            .await?;
        expect(Step::Authenticate, &reply, &[ReplyCode::AUTH_CONTINUE])?;

        let reply = self
            .command(
                Step::Authenticate,
                &STANDARD.encode(password.as_bytes()),
                Some("<password>"),
            )
            .await?;
        expect(Step::Authenticate, &reply, &[ReplyCode::AUTH_SUCCEEDED])?;

        let capabilities = std::mem::take(&mut self.capabilities);
        Ok(self.into_state(capabilities))
    }

    /// Server extensions from the EHLO reply, verbatim.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Declares the sender with `MAIL FROM`.
    ///
    /// # Errors
    ///
    /// [`Error::Submission`] at [`Step::DeclareSender`] unless `250`.
    pub async fn mail_from(mut self, from: &Address) -> Result<Client<S, SenderDeclared>> {
        let reply = self
            .command(Step::DeclareSender, &format!("MAIL FROM:<{from}>"), None)
            .await?;
        expect(Step::DeclareSender, &reply, &[ReplyCode::OK])?;

        let capabilities = std::mem::take(&mut self.capabilities);
        Ok(self.into_state(capabilities))
    }
}

impl<S> Client<S, SenderDeclared>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Declares the first recipient with `RCPT TO`.
    ///
    /// # Errors
    ///
    /// [`Error::Submission`] at [`Step::DeclareRecipients`] unless `250` or
    /// `251`.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Client<S, RecipientDeclared>> {
        rcpt(&mut self.stream, to).await?;

        let capabilities = std::mem::take(&mut self.capabilities);
        Ok(self.into_state(capabilities))
    }
}

impl<S> Client<S, RecipientDeclared>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Declares another recipient.
    ///
    /// # Errors
    ///
    /// As for the first recipient.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Self> {
        rcpt(&mut self.stream, to).await?;
        Ok(self)
    }

    /// Sends `DATA`, the framed message and the lone `.` line.
    ///
    /// `content` is the composed message; line endings are normalised and
    /// leading dots stuffed here.
    ///
    /// # Errors
    ///
    /// [`Error::Submission`] at [`Step::TransmitBody`] unless the server
    /// answers `354` then `250`.
    pub async fn data(mut self, content: &str) -> Result<Client<S, Delivered>> {
        let reply = self.command(Step::TransmitBody, "DATA", None).await?;
        expect(Step::TransmitBody, &reply, &[ReplyCode::START_DATA])?;

        let payload = encode_data(content);
        debug!(bytes = payload.len(), "sending message data");
        self.stream.write_all(&payload).await?;

        let reply = read_reply(&mut self.stream, Step::TransmitBody).await?;
        expect(Step::TransmitBody, &reply, &[ReplyCode::OK])?;

        let capabilities = std::mem::take(&mut self.capabilities);
        Ok(self.into_state(capabilities))
    }
}

impl<S> Client<S, Delivered>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends `QUIT` and closes the stream.
    ///
    /// # Errors
    ///
    /// [`Error::Submission`] at [`Step::Close`] unless `221`. The stream is
    /// closed either way.
    pub async fn quit(mut self) -> Result<()> {
        let result = match self.command(Step::Close, "QUIT", None).await {
            Ok(reply) => expect(Step::Close, &reply, &[ReplyCode::CLOSING]),
            Err(e) => Err(e),
        };

        self.stream.close().await;
        result
    }
}

// Common implementation for all states
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Writes one command line and reads one reply.
    ///
    /// `masked` replaces the line in logs.
    async fn command(&mut self, step: Step, line: &str, masked: Option<&str>) -> Result<Reply> {
        debug!(%step, command = masked.unwrap_or(line), "sending");
        self.stream.write_all(format!("{line}\r\n").as_bytes()).await?;
        read_reply(&mut self.stream, step).await
    }

    fn into_state<Next>(self, capabilities: Vec<String>) -> Client<S, Next> {
        Client {
            stream: self.stream,
            capabilities,
            _state: PhantomData,
        }
    }
}

async fn rcpt<S>(stream: &mut LineStream<S>, to: &Address) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = format!("RCPT TO:<{to}>");
    debug!(step = %Step::DeclareRecipients, command = %line, "sending");
    stream.write_all(format!("{line}\r\n").as_bytes()).await?;

    let reply = read_reply(stream, Step::DeclareRecipients).await?;
    expect(
        Step::DeclareRecipients,
        &reply,
        &[ReplyCode::OK, ReplyCode::FORWARD],
    )
}

/// Reads one complete reply, following `-` continuation lines.
///
/// A malformed reply is reported as a rejection at `step`.
async fn read_reply<S>(stream: &mut LineStream<S>, step: Step) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Vec::new();

    loop {
        let line = stream.read_text_line().await?;
        let line = line.trim_end_matches(['\r', '\n']).to_string();

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
        if lines.len() >= MAX_REPLY_LINES {
            return Err(Error::Submission {
                step,
                response: format!("reply exceeds {MAX_REPLY_LINES} lines"),
            });
        }
    }

    parse_reply(&lines).map_err(|e| {
        warn!(%step, error = %e, "malformed reply");
        Error::Submission {
            step,
            response: lines.join(" / "),
        }
    })
}

/// Fails with the reply line unless its code is one of `accepted`.
fn expect(step: Step, reply: &Reply, accepted: &[ReplyCode]) -> Result<()> {
    if accepted.contains(&reply.code) {
        Ok(())
    } else {
        warn!(%step, reply = %reply, "unexpected reply");
        Err(Error::Submission {
            step,
            response: reply.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_greeting_rejected() {
        let mock = Builder::new().read(b"554 no service\r\n").build();

        let err = Client::greet(LineStream::new(mock)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Submission { step: Step::Greeting, ref response } if response == "554 no service"
        ));
    }

    #[tokio::test]
    async fn test_ehlo_multiline_capabilities() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"EHLO client.example\r\n")
            .read(b"250-smtp.example.com Hello\r\n250-AUTH LOGIN PLAIN\r\n250 8BITMIME\r\n")
            .build();

        let client = Client::greet(LineStream::new(mock)).await.unwrap();
        let client = client.ehlo("client.example").await.unwrap();
        assert_eq!(client.capabilities(), &["AUTH LOGIN PLAIN", "8BITMIME"]);
    }

    #[tokio::test]
    async fn test_auth_login_exchange() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 hi\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 VXNlcm5hbWU6\r\n")
            .write(b"dXNlckBleGFtcGxlLmNvbQ==\r\n")
            .read(b"334 UGFzc3dvcmQ6\r\n")
            .write(b"c2VjcmV0\r\n")
            .read(b"235 2.7.0 Authentication successful\r\n")
            .build();

        let client = Client::greet(LineStream::new(mock)).await.unwrap();
        let client = client.ehlo("localhost").await.unwrap();
        client.auth_login("user@example.com", "secret").await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_rejected() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 hi\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 VXNlcm5hbWU6\r\n")
            .write(b"dQ==\r\n")
            .read(b"334 UGFzc3dvcmQ6\r\n")
            .write(b"cA==\r\n")
            .read(b"535 5.7.8 Bad credentials\r\n")
            .build();

        let client = Client::greet(LineStream::new(mock)).await.unwrap();
        let client = client.ehlo("localhost").await.unwrap();
        let err = client.auth_login("u", "p").await.unwrap_err();
        assert_eq!(err.step(), Some(Step::Authenticate));
        assert_eq!(err.reply_code(), Some(535));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_step_failure() {
        let mock = Builder::new().read(b"hello there\r\n").build();

        let err = Client::greet(LineStream::new(mock)).await.unwrap_err();
        assert_eq!(err.step(), Some(Step::Greeting));
    }

    #[tokio::test]
    async fn test_invalid_client_domain() {
        let mock = Builder::new().read(b"220 ready\r\n").build();

        let client = Client::greet(LineStream::new(mock)).await.unwrap();
        assert!(matches!(
            client.ehlo("bad domain").await,
            Err(Error::InvalidMessage(_))
        ));
    }
}
