//! Mailbox session state machine.
//!
//! A [`Session`] owns at most one transport and walks the phases
//! `Unconnected → Connected → Authenticated → Selected`, ending in `Closed`.
//! Every operation takes `&mut self`, so at most one command is in flight.

use std::fmt;

use abrimail_mime::MessageRecord;
use abrimail_transport::{ConnectionSettings, LineStream, MailStream};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::command::{Command, FetchItems, SequenceRange};
use crate::parser::parse_fetch_unit;
use crate::reader::{ResponseUnit, TaggedResponse, read_tagged, read_unit};
use crate::tag::{Tag, TagGenerator};
use crate::types::{FetchData, HeaderRecord, MailboxInfo};
use crate::{Error, Result};

/// Mailbox selected when none is named.
pub const DEFAULT_MAILBOX: &str = "INBOX";

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No transport yet.
    Unconnected,
    /// Greeting received, not logged in.
    Connected,
    /// Logged in, no mailbox selected.
    Authenticated,
    /// A mailbox is selected.
    Selected {
        /// Name passed to SELECT.
        mailbox: String,
        /// Whether the server granted read-only access.
        read_only: bool,
    },
    /// Logged out; the transport is released.
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconnected => f.write_str("unconnected"),
            Self::Connected => f.write_str("connected"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::Selected { mailbox, .. } => write!(f, "selected ({mailbox})"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// An IMAP session over one connection.
pub struct Session<S = MailStream> {
    settings: ConnectionSettings,
    stream: Option<LineStream<S>>,
    tags: TagGenerator,
    phase: Phase,
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("settings", &self.settings)
            .field("tags", &self.tags)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl Session<MailStream> {
    /// Creates an unconnected session. No network activity happens here.
    #[must_use]
    pub fn new(settings: ConnectionSettings) -> Self {
        Self::unattached(settings)
    }

    /// Validates the settings, opens the transport and reads the greeting.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless the session is unconnected
    /// - a settings error, before any socket is opened
    /// - transport errors from connect and handshake
    /// - [`Error::Connection`] if the greeting is not `* OK` or `* PREAUTH`
    pub async fn connect(&mut self) -> Result<()> {
        self.require("connect", |phase| matches!(phase, Phase::Unconnected))?;
        self.settings
            .validate()
            .map_err(abrimail_transport::Error::from)?;

        let stream = abrimail_transport::open(&self.settings).await?;
        info!(
            address = %self.settings.address(),
            tls = self.settings.tls,
            "connected"
        );

        self.attach(stream).await
    }

    /// Connects and logs in with the credentials from the settings.
    ///
    /// # Errors
    ///
    /// Any error from [`Session::connect`] or [`Session::login`].
    pub async fn connect_and_login(&mut self) -> Result<()> {
        self.connect().await?;
        if self.phase == Phase::Authenticated {
            // PREAUTH greeting
            return Ok(());
        }

        let username = self.settings.username.clone();
        let password = self.settings.password.clone();
        self.login(&username, &password).await
    }

    /// Runs `body` on a logged-in session, then always logs out.
    ///
    /// The transport is released whether `body` succeeds or fails. If the
    /// returned future is dropped early, dropping the session closes the
    /// socket.
    ///
    /// # Errors
    ///
    /// The connect/login error, or whatever `body` returns.
    pub async fn scoped<T, F>(settings: ConnectionSettings, body: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Self) -> Result<T>,
    {
        let mut session = Self::new(settings);

        if let Err(e) = session.connect_and_login().await {
            session.logout().await;
            return Err(e);
        }

        let result = body(&mut session).await;
        session.logout().await;
        result
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates an unconnected session for a caller-supplied transport.
    ///
    /// Use [`Session::attach`] to hand it a stream.
    #[must_use]
    pub const fn unattached(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            stream: None,
            tags: TagGenerator::new(),
            phase: Phase::Unconnected,
        }
    }

    /// Takes ownership of an open stream and reads the server greeting.
    ///
    /// `* OK` moves to `Connected`, `* PREAUTH` straight to `Authenticated`.
    /// Anything else releases the stream.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless unconnected, transport errors while
    /// reading the greeting, or [`Error::Connection`] for a rejected greeting.
    pub async fn attach(&mut self, mut stream: LineStream<S>) -> Result<()> {
        self.require("attach", |phase| matches!(phase, Phase::Unconnected))?;

        let greeting = match read_unit(&mut stream).await {
            Ok(unit) => unit,
            Err(e) => {
                stream.close().await;
                return Err(e);
            }
        };

        let text = greeting.first_line_text().into_owned();
        let upper = text.to_ascii_uppercase();
        let phase = if upper.starts_with("* OK") {
            Phase::Connected
        } else if upper.starts_with("* PREAUTH") {
            Phase::Authenticated
        } else {
            stream.close().await;
            return Err(Error::Connection(text));
        };

        debug!(greeting = %text, %phase, "greeting accepted");
        self.stream = Some(stream);
        self.phase = phase;

        Ok(())
    }

    /// Logs in with `LOGIN "user" "pass"`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless connected; [`Error::Auth`] carrying the
    /// masked command and the tagged line if the server refuses.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.require("LOGIN", |phase| matches!(phase, Phase::Connected))?;

        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        let (tag, response) = self.execute(&command).await?;

        if !response.status.is_ok() {
            return Err(Error::Auth {
                command: command.masked(tag),
                response: response.tagged_line,
            });
        }

        self.phase = Phase::Authenticated;
        info!(username, "logged in");

        Ok(())
    }

    /// Selects a mailbox and reports its counters.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless authenticated or selected;
    /// [`Error::Protocol`] if the server refuses.
    pub async fn select_mailbox(&mut self, mailbox: &str) -> Result<MailboxInfo> {
        self.require("SELECT", |phase| {
            matches!(phase, Phase::Authenticated | Phase::Selected { .. })
        })?;

        let command = Command::Select {
            mailbox: mailbox.to_string(),
        };
        let (tag, response) = self.execute(&command).await?;

        if !response.status.is_ok() {
            // A failed SELECT leaves no mailbox selected.
            self.phase = Phase::Authenticated;
            return Err(protocol_error(&command, tag, response));
        }

        let mut info = MailboxInfo {
            name: mailbox.to_string(),
            message_count: 0,
            recent_count: 0,
            read_only: response
                .tagged_line
                .to_ascii_uppercase()
                .contains("[READ-ONLY]"),
        };
        for unit in &response.untagged {
            match untagged_count(unit) {
                Some((n, "EXISTS")) => info.message_count = n,
                Some((n, "RECENT")) => info.recent_count = n,
                _ => {}
            }
        }

        self.phase = Phase::Selected {
            mailbox: info.name.clone(),
            read_only: info.read_only,
        };
        info!(
            mailbox,
            messages = info.message_count,
            recent = info.recent_count,
            read_only = info.read_only,
            "mailbox selected"
        );

        Ok(info)
    }

    /// Selects [`DEFAULT_MAILBOX`].
    ///
    /// # Errors
    ///
    /// See [`Session::select_mailbox`].
    pub async fn select_inbox(&mut self) -> Result<MailboxInfo> {
        self.select_mailbox(DEFAULT_MAILBOX).await
    }

    /// Fetches envelope, flags and size for `count` messages from `start`.
    ///
    /// A `count` of zero returns an empty list without contacting the
    /// server. Malformed FETCH responses are skipped, as are FETCH
    /// responses without an envelope (unsolicited flag updates).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless selected, [`Error::InvalidArgument`]
    /// for `start == 0`, [`Error::Protocol`] if the server refuses.
    pub async fn fetch_headers(&mut self, start: u32, count: u32) -> Result<Vec<HeaderRecord>> {
        let units = self.fetch_range(start, count, FetchItems::Summary).await?;

        Ok(fetch_data(&units)
            .filter(|data| data.envelope.is_some())
            .map(HeaderRecord::from)
            .collect())
    }

    /// Fetches the raw header block of `count` messages from `start`.
    ///
    /// # Errors
    ///
    /// As for [`Session::fetch_headers`].
    pub async fn fetch_raw_headers(&mut self, start: u32, count: u32) -> Result<Vec<String>> {
        let units = self.fetch_range(start, count, FetchItems::Header).await?;

        Ok(fetch_data(&units)
            .filter_map(|data| {
                data.body("HEADER")
                    .map(|raw| String::from_utf8_lossy(raw).into_owned())
            })
            .collect())
    }

    /// Fetches and parses one full message.
    ///
    /// # Errors
    ///
    /// As for [`Session::fetch_raw_message`].
    pub async fn fetch_message(&mut self, id: u32) -> Result<MessageRecord> {
        let raw = self.fetch_raw_message(id).await?;
        let record = MessageRecord::parsed(id, raw);
        debug!(id, size = record.raw().len(), subject = record.subject(), "message fetched");

        Ok(record)
    }

    /// Fetches the exact bytes of one message (`BODY[]`).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless selected, [`Error::InvalidArgument`]
    /// for `id == 0`, [`Error::Protocol`] if the server refuses or returns
    /// no body.
    pub async fn fetch_raw_message(&mut self, id: u32) -> Result<Vec<u8>> {
        self.require("FETCH", |phase| matches!(phase, Phase::Selected { .. }))?;

        let command = Command::Fetch {
            range: SequenceRange::from_count(id, 1)?,
            items: FetchItems::FullBody,
        };
        let (tag, response) = self.execute(&command).await?;
        if !response.status.is_ok() {
            return Err(protocol_error(&command, tag, response));
        }

        let body = response.untagged.iter().find_map(|unit| {
            unit.literal_after("BODY[]").map(<[u8]>::to_vec).or_else(|| {
                // Small bodies may come back as a quoted string.
                parse_fetch_unit(unit)
                    .ok()
                    .flatten()
                    .and_then(|data| data.body("").map(<[u8]>::to_vec))
            })
        });

        body.ok_or_else(|| Error::Protocol {
            command: command.masked(tag),
            response: format!("no message body returned for {id}"),
        })
    }

    /// Sends `NOOP`, keeping the connection alive.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] before connect or after logout;
    /// [`Error::Protocol`] if the server refuses.
    pub async fn noop(&mut self) -> Result<()> {
        self.require("NOOP", |phase| {
            !matches!(phase, Phase::Unconnected | Phase::Closed)
        })?;

        let command = Command::Noop;
        let (tag, response) = self.execute(&command).await?;
        if !response.status.is_ok() {
            return Err(protocol_error(&command, tag, response));
        }

        Ok(())
    }

    /// Logs out and releases the transport.
    ///
    /// Best effort: failures are logged and swallowed. Calling it again, or
    /// on a session that never connected, only marks it closed.
    pub async fn logout(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            self.phase = Phase::Closed;
            return;
        };

        let tag = self.tags.next();
        if let Err(e) = logout_exchange(&mut stream, tag).await {
            warn!(error = %e, "logout failed, closing anyway");
        }

        stream.close().await;
        self.phase = Phase::Closed;
        debug!("session closed");
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Settings this session was created with.
    #[must_use]
    pub const fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Name of the selected mailbox, if any.
    #[must_use]
    pub fn mailbox(&self) -> Option<&str> {
        match &self.phase {
            Phase::Selected { mailbox, .. } => Some(mailbox),
            _ => None,
        }
    }

    /// Returns true while a transport is held.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
            && !matches!(self.phase, Phase::Unconnected | Phase::Closed)
    }

    /// Returns true once logged in, until logout.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.phase, Phase::Authenticated | Phase::Selected { .. })
    }

    /// Number of tags allocated so far.
    #[must_use]
    pub const fn commands_sent(&self) -> u64 {
        self.tags.issued()
    }

    fn require(&self, operation: &str, allowed: impl Fn(&Phase) -> bool) -> Result<()> {
        if allowed(&self.phase) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "{operation} is not allowed while {}",
                self.phase
            )))
        }
    }

    async fn fetch_range(
        &mut self,
        start: u32,
        count: u32,
        items: FetchItems,
    ) -> Result<Vec<ResponseUnit>> {
        self.require("FETCH", |phase| matches!(phase, Phase::Selected { .. }))?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let command = Command::Fetch {
            range: SequenceRange::from_count(start, count)?,
            items,
        };
        let (tag, response) = self.execute(&command).await?;
        if !response.status.is_ok() {
            return Err(protocol_error(&command, tag, response));
        }

        Ok(response.untagged)
    }

    /// Sends one command and collects its response.
    ///
    /// A transport failure leaves the stream at an unknown position, so the
    /// session is closed.
    async fn execute(&mut self, command: &Command) -> Result<(Tag, TaggedResponse)> {
        let tag = self.tags.next();
        let bytes = command.serialize(tag)?;

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no open transport".to_string()))?;

        debug!(command = %command.masked(tag), "sending");
        let result = match stream.write_all(&bytes).await {
            Ok(()) => read_tagged(stream, tag).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(response) => {
                debug!(
                    %tag,
                    status = ?response.status,
                    untagged = response.untagged.len(),
                    "completed"
                );
                Ok((tag, response))
            }
            Err(e) => {
                if matches!(e, Error::Transport(_)) {
                    warn!(%tag, error = %e, "transport failed, closing session");
                    if let Some(mut stream) = self.stream.take() {
                        stream.close().await;
                    }
                    self.phase = Phase::Closed;
                }
                Err(e)
            }
        }
    }
}

async fn logout_exchange<S>(stream: &mut LineStream<S>, tag: Tag) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let bytes = Command::Logout.serialize(tag)?;
    debug!(command = %Command::Logout.masked(tag), "sending");
    stream.write_all(&bytes).await?;
    read_tagged(stream, tag).await?;
    Ok(())
}

fn protocol_error(command: &Command, tag: Tag, response: TaggedResponse) -> Error {
    Error::Protocol {
        command: command.masked(tag),
        response: response.tagged_line,
    }
}

/// Parses `* <n> <WORD>` into its number and upper-cased word.
fn untagged_count(unit: &ResponseUnit) -> Option<(u32, &'static str)> {
    let text = unit.first_line_text();
    let mut words = text.split_whitespace();
    if words.next() != Some("*") {
        return None;
    }
    let n = words.next()?.parse().ok()?;
    match words.next()?.to_ascii_uppercase().as_str() {
        "EXISTS" => Some((n, "EXISTS")),
        "RECENT" => Some((n, "RECENT")),
        _ => None,
    }
}

/// Parses every FETCH unit, skipping malformed ones.
fn fetch_data(units: &[ResponseUnit]) -> impl Iterator<Item = FetchData> + '_ {
    units
        .iter()
        .filter_map(|unit| match parse_fetch_unit(unit) {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    error = %e,
                    line = %unit.first_line_text(),
                    "skipping malformed FETCH response"
                );
                None
            }
        })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use tokio_test::io::{Builder, Mock};

    fn settings() -> ConnectionSettings {
        ConnectionSettings::new("imap.example.com", 993, "user", "secret")
    }

    async fn attached(mock: Mock) -> Session<Mock> {
        let mut session = Session::unattached(settings());
        session.attach(LineStream::new(mock)).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_greeting_ok() {
        let session = attached(Builder::new().read(b"* OK IMAP4rev1 ready\r\n").build()).await;
        assert_eq!(session.phase(), &Phase::Connected);
        assert!(session.is_connected());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_greeting_preauth() {
        let session = attached(Builder::new().read(b"* PREAUTH welcome back\r\n").build()).await;
        assert_eq!(session.phase(), &Phase::Authenticated);
    }

    #[tokio::test]
    async fn test_greeting_rejected() {
        let mock = Builder::new().read(b"* BYE too busy\r\n").build();
        let mut session = Session::unattached(settings());

        let err = session.attach(LineStream::new(mock)).await.unwrap_err();
        assert!(matches!(err, Error::Connection(ref text) if text == "* BYE too busy"));
        assert_eq!(session.phase(), &Phase::Unconnected);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_login_and_noop() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A001 LOGIN \"user\" \"secret\"\r\n")
            .read(b"A001 OK LOGIN completed\r\n")
            .write(b"A002 NOOP\r\n")
            .read(b"A002 OK NOOP completed\r\n")
            .build();
        let mut session = attached(mock).await;

        session.login("user", "secret").await.unwrap();
        assert!(session.is_authenticated());
        session.noop().await.unwrap();
        assert_eq!(session.commands_sent(), 2);
    }

    #[tokio::test]
    async fn test_login_twice_is_state_error() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A001 LOGIN \"user\" \"secret\"\r\n")
            .read(b"A001 OK\r\n")
            .build();
        let mut session = attached(mock).await;

        session.login("user", "secret").await.unwrap();
        let err = session.login("user", "secret").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_fetch_before_select_is_state_error() {
        let mut session = attached(Builder::new().read(b"* OK ready\r\n").build()).await;

        assert!(matches!(
            session.fetch_headers(1, 10).await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            session.fetch_message(1).await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            session.select_mailbox("INBOX").await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_select_read_only() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A001 SELECT \"Archive\"\r\n")
            .read(b"* 7 EXISTS\r\n* 0 RECENT\r\n* FLAGS (\\Seen)\r\n")
            .read(b"A001 OK [READ-ONLY] SELECT completed\r\n")
            .build();
        let mut session = attached(mock).await;

        let info = session.select_mailbox("Archive").await.unwrap();
        assert_eq!(info.message_count, 7);
        assert_eq!(info.recent_count, 0);
        assert!(info.read_only);
        assert_eq!(session.mailbox(), Some("Archive"));
    }

    #[tokio::test]
    async fn test_select_failure() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A001 SELECT \"Nope\"\r\n")
            .read(b"A001 NO Mailbox does not exist\r\n")
            .build();
        let mut session = attached(mock).await;

        let err = session.select_mailbox("Nope").await.unwrap_err();
        match err {
            Error::Protocol { command, response } => {
                assert_eq!(command, "A001 SELECT \"Nope\"");
                assert_eq!(response, "A001 NO Mailbox does not exist");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(session.phase(), &Phase::Authenticated);
    }

    #[tokio::test]
    async fn test_fetch_zero_count_sends_nothing() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A001 SELECT \"INBOX\"\r\n")
            .read(b"* 0 EXISTS\r\nA001 OK\r\n")
            .build();
        let mut session = attached(mock).await;
        session.select_inbox().await.unwrap();

        assert!(session.fetch_headers(1, 0).await.unwrap().is_empty());
        assert!(matches!(
            session.fetch_headers(0, 5).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_raw_headers() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A001 SELECT \"INBOX\"\r\n")
            .read(b"* 2 EXISTS\r\nA001 OK\r\n")
            .write(b"A002 FETCH 1:2 (BODY[HEADER])\r\n")
            .read(b"* 1 FETCH (BODY[HEADER] {8}\r\nA: 1\r\n\r\n)\r\n")
            .read(b"* 2 FETCH (BODY[HEADER] {8}\r\nB: 2\r\n\r\n)\r\n")
            .read(b"A002 OK FETCH completed\r\n")
            .build();
        let mut session = attached(mock).await;
        session.select_inbox().await.unwrap();

        let headers = session.fetch_raw_headers(1, 2).await.unwrap();
        assert_eq!(headers, vec!["A: 1\r\n\r\n", "B: 2\r\n\r\n"]);
    }

    #[tokio::test]
    async fn test_fetch_skips_malformed_units() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A001 SELECT \"INBOX\"\r\n")
            .read(b"* 2 EXISTS\r\nA001 OK\r\n")
            .write(b"A002 FETCH 1:2 (ENVELOPE FLAGS RFC822.SIZE)\r\n")
            .read(b"* 1 FETCH (FLAGS (\\Seen) RFC822.SIZE 12\r\n")
            .read(b"* 2 FETCH (FLAGS () RFC822.SIZE 34)\r\n")
            .read(b"A002 OK\r\n")
            .build();
        let mut session = attached(mock).await;
        session.select_inbox().await.unwrap();

        let records = session.fetch_headers(1, 2).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].seq, 2);
        assert_eq!(records[0].size, 34);
        assert!(!records[0].is_read);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A001 LOGOUT\r\n")
            .read(b"* BYE logging out\r\nA001 OK LOGOUT completed\r\n")
            .build();
        let mut session = attached(mock).await;

        session.logout().await;
        assert_eq!(session.phase(), &Phase::Closed);
        assert!(!session.is_connected());

        session.logout().await;
        assert_eq!(session.phase(), &Phase::Closed);
        assert!(matches!(session.noop().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_logout_swallows_peer_close() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A001 LOGOUT\r\n")
            .build();
        let mut session = attached(mock).await;

        session.logout().await;
        assert_eq!(session.phase(), &Phase::Closed);
    }

    #[tokio::test]
    async fn test_transport_failure_closes_session() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A001 NOOP\r\n")
            .build();
        let mut session = attached(mock).await;

        let err = session.noop().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(abrimail_transport::Error::EndOfStream)
        ));
        assert_eq!(session.phase(), &Phase::Closed);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_settings() {
        let mut session = Session::new(ConnectionSettings::new("", 993, "user", "secret"));

        let err = session.connect().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(abrimail_transport::Error::Settings(_))
        ));
        assert_eq!(session.phase(), &Phase::Unconnected);
    }
}
