//! Integration tests for the IMAP session.
//!
//! These tests use a mock stream to simulate IMAP server responses
//! without requiring a real server connection.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use abrimail_imap::{Error, Phase, Session};
use abrimail_transport::{ConnectionSettings, LineStream};

/// Mock stream that returns predefined responses.
struct MockStream {
    /// Responses to return (in order).
    responses: Cursor<Vec<u8>>,
    /// Captured bytes sent by the client, shared with the test.
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        let pos = usize::try_from(self.responses.position()).unwrap();

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn settings() -> ConnectionSettings {
    ConnectionSettings::new("imap.example.com", 993, "user@example.com", "s3cret")
}

async fn session_with(responses: &[u8]) -> (Session<MockStream>, Arc<Mutex<Vec<u8>>>) {
    let (stream, sent) = MockStream::new(responses);
    let mut session = Session::unattached(settings());
    session.attach(LineStream::new(stream)).await.unwrap();
    (session, sent)
}

fn sent_text(sent: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(sent.lock().unwrap().clone()).unwrap()
}

#[tokio::test]
async fn test_select_reports_counts() {
    let responses = concat!(
        "* OK IMAP4rev1 Service Ready\r\n",
        "A001 OK LOGIN completed\r\n",
        "* 42 EXISTS\r\n",
        "* 3 RECENT\r\n",
        "* OK [UIDVALIDITY 1] UIDs valid\r\n",
        "A002 OK [READ-WRITE] SELECT completed\r\n",
    );
    let (mut session, sent) = session_with(responses.as_bytes()).await;

    session.login("user@example.com", "s3cret").await.unwrap();
    let info = session.select_mailbox("INBOX").await.unwrap();

    assert_eq!(info.message_count, 42);
    assert_eq!(info.recent_count, 3);
    assert!(!info.read_only);
    assert_eq!(
        session.phase(),
        &Phase::Selected {
            mailbox: "INBOX".to_string(),
            read_only: false,
        }
    );
    assert_eq!(
        sent_text(&sent),
        "A001 LOGIN \"user@example.com\" \"s3cret\"\r\nA002 SELECT \"INBOX\"\r\n"
    );
}

#[tokio::test]
async fn test_fetch_message_with_literal() {
    let message = concat!(
        "Subject: Test\r\n",
        "From: a@b.c\r\n",
        "\r\n",
        "Hello world\r\n",
        "Second line!\r\n",
    );
    assert_eq!(message.len(), 57);

    let responses = format!(
        concat!(
            "* PREAUTH ready\r\n",
            "* 1 EXISTS\r\n",
            "A001 OK SELECT completed\r\n",
            "* 1 FETCH (BODY[] {{57}}\r\n",
            "{}",
            ")\r\n",
            "A002 OK FETCH completed\r\n",
        ),
        message
    );
    let (mut session, sent) = session_with(responses.as_bytes()).await;

    session.select_inbox().await.unwrap();
    let record = session.fetch_message(1).await.unwrap();

    assert_eq!(record.raw().len(), 57);
    assert_eq!(record.raw(), message.as_bytes());
    assert_eq!(record.subject(), "Test");
    assert_eq!(record.from(), "a@b.c");
    assert_eq!(record.body(), "Hello world\r\nSecond line!");
    assert!(sent_text(&sent).ends_with("A002 FETCH 1 (BODY[])\r\n"));
}

#[tokio::test]
async fn test_literal_containing_tag_text() {
    let message = "Subject: tricky\r\n\r\nA002 OK not really\r\n";
    let responses = format!(
        "* PREAUTH ready\r\nA001 OK\r\n* 5 FETCH (BODY[] {{{}}}\r\n{message})\r\nA002 OK done\r\n",
        message.len()
    );
    let (mut session, _sent) = session_with(responses.as_bytes()).await;

    session.select_inbox().await.unwrap();
    let raw = session.fetch_raw_message(5).await.unwrap();
    assert_eq!(raw, message.as_bytes());
}

#[tokio::test]
async fn test_fetch_headers_parses_envelopes() {
    let responses = concat!(
        "* PREAUTH ready\r\n",
        "* 2 EXISTS\r\n",
        "A001 OK\r\n",
        "* 1 FETCH (FLAGS (\\Seen) RFC822.SIZE 1200 ENVELOPE (\"Mon, 1 Jan 2024 10:00:00 +0000\" \"Hello\" ((\"Alice\" NIL \"alice\" \"example.com\")) NIL NIL ((NIL NIL \"bob\" \"example.org\")) NIL NIL NIL \"<1@example.com>\"))\r\n",
        "* 2 FETCH (FLAGS () RFC822.SIZE 80 ENVELOPE (NIL {9}\r\n",
        "Re: (two) ((NIL NIL \"carol\" \"example.net\")) NIL NIL NIL NIL NIL NIL NIL))\r\n",
        "A002 OK FETCH completed\r\n",
    );
    let (mut session, sent) = session_with(responses.as_bytes()).await;

    session.select_inbox().await.unwrap();
    let headers = session.fetch_headers(1, 2).await.unwrap();

    assert_eq!(headers.len(), 2);
    assert_eq!(headers[0].subject, "Hello");
    assert_eq!(headers[0].from, "Alice <alice@example.com>");
    assert_eq!(headers[0].to, "bob@example.org");
    assert_eq!(headers[0].date, "Mon, 1 Jan 2024 10:00:00 +0000");
    assert_eq!(headers[0].size, 1200);
    assert!(headers[0].is_read);

    assert_eq!(headers[1].subject, "Re: (two)");
    assert_eq!(headers[1].from, "carol@example.net");
    assert!(!headers[1].is_read);

    assert!(sent_text(&sent).ends_with("A002 FETCH 1:2 (ENVELOPE FLAGS RFC822.SIZE)\r\n"));
}

#[tokio::test]
async fn test_fetch_headers_ignores_unsolicited_flag_updates() {
    let responses = concat!(
        "* PREAUTH ready\r\n",
        "* 9 EXISTS\r\n",
        "A001 OK\r\n",
        "* 1 FETCH (FLAGS () RFC822.SIZE 10 ENVELOPE (NIL \"Hello\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n",
        "* 7 FETCH (FLAGS (\\Seen))\r\n",
        "A002 OK FETCH completed\r\n",
    );
    let (mut session, _sent) = session_with(responses.as_bytes()).await;

    session.select_inbox().await.unwrap();
    let headers = session.fetch_headers(1, 1).await.unwrap();

    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].seq, 1);
    assert_eq!(headers[0].subject, "Hello");
}

#[tokio::test]
async fn test_auth_failure_masks_password() {
    let responses = "* OK ready\r\nA001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n";
    let (mut session, _sent) = session_with(responses.as_bytes()).await;

    let err = session.login("user@example.com", "s3cret").await.unwrap_err();
    match &err {
        Error::Auth { command, response } => {
            assert!(!command.contains("s3cret"));
            assert!(command.starts_with("A001 LOGIN \"user@example.com\""));
            assert_eq!(
                response,
                "A001 NO [AUTHENTICATIONFAILED] Invalid credentials"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.to_string().contains("s3cret"));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_operations_out_of_order() {
    let (mut session, sent) = session_with(b"* OK ready\r\n").await;

    assert!(matches!(
        session.fetch_headers(1, 1).await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        session.fetch_raw_message(1).await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        session.select_inbox().await,
        Err(Error::InvalidState(_))
    ));
    assert!(sent_text(&sent).is_empty());
}

#[tokio::test]
async fn test_tags_increase_across_commands() {
    let responses = concat!(
        "* OK ready\r\n",
        "A001 OK\r\n",
        "A002 OK\r\n",
        "A003 OK\r\n",
        "* BYE\r\n",
        "A004 OK\r\n",
    );
    let (mut session, sent) = session_with(responses.as_bytes()).await;

    session.login("u", "p").await.unwrap();
    session.noop().await.unwrap();
    session.noop().await.unwrap();
    session.logout().await;

    let tags: Vec<String> = sent_text(&sent)
        .lines()
        .map(|line| line.split(' ').next().unwrap().to_string())
        .collect();
    assert_eq!(tags, vec!["A001", "A002", "A003", "A004"]);
    assert_eq!(session.phase(), &Phase::Closed);
}

#[tokio::test]
async fn test_empty_host_fails_before_connecting() {
    let settings = ConnectionSettings::new("   ", 993, "user", "pass");

    let result = Session::scoped(settings, async |session| session.noop().await).await;

    assert!(matches!(
        result,
        Err(Error::Transport(abrimail_transport::Error::Settings(_)))
    ));
}
