//! Integration tests for the submission sequence.
//!
//! A mock stream replays scripted server replies and records every byte
//! the client writes.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use abrimail_smtp::{Error, Mailer, OutgoingMessage, Step};
use abrimail_transport::{ConnectionSettings, LineStream};

/// Mock stream that returns predefined responses.
struct MockStream {
    responses: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &str) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            responses: Cursor::new(responses.as_bytes().to_vec()),
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

        // One reply line per read, like a server waiting on each command.
        let remaining = &data[pos..];
        let line_end = remaining
            .iter()
            .position(|&b| b == b'\n')
            .map_or(remaining.len(), |i| i + 1);
        let to_read = line_end.min(buf.remaining());
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

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn mailer() -> Mailer {
    Mailer::new(ConnectionSettings::new(
        "smtp.example.com",
        465,
        "me@example.com",
        "secret",
    ))
    .with_client_domain("client.example.com")
}

fn sent_text(sent: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(sent.lock().unwrap().clone()).unwrap()
}

const HAPPY_REPLIES: &str = concat!(
    "220 smtp.example.com ESMTP ready\r\n",
    "250-smtp.example.com Hello client.example.com\r\n",
    "250-AUTH LOGIN PLAIN\r\n",
    "250 8BITMIME\r\n",
    "334 VXNlcm5hbWU6\r\n",
    "334 UGFzc3dvcmQ6\r\n",
    "235 2.7.0 Accepted\r\n",
    "250 2.1.0 Sender OK\r\n",
    "250 2.1.5 Recipient OK\r\n",
    "251 2.1.5 User not local; will forward\r\n",
    "354 Start mail input\r\n",
    "250 2.0.0 Queued\r\n",
    "221 2.0.0 Bye\r\n",
);

#[tokio::test]
async fn test_full_submission_sequence() {
    init_tracing();
    let (stream, sent) = MockStream::new(HAPPY_REPLIES);
    let message = OutgoingMessage::new("me@example.com")
        .to("a@example.com")
        .to("b@example.org")
        .subject("Status")
        .header("X-Priority", "3")
        .body("Hello,\n.signature follows\nBye\n");

    mailer()
        .send_over(LineStream::new(stream), &message)
        .await
        .unwrap();

    let text = sent_text(&sent);
    let (commands, data) = text.split_once("DATA\r\n").unwrap();
    assert_eq!(
        commands,
        concat!(
            "EHLO client.example.com\r\n",
            "AUTH LOGIN\r\n",
            "bWVAZXhhbXBsZS5jb20=\r\n",
            "c2VjcmV0\r\n",
            "MAIL FROM:<me@example.com>\r\n",
            "RCPT TO:<a@example.com>\r\n",
            "RCPT TO:<b@example.org>\r\n",
        )
    );

    assert!(data.starts_with("From: me@example.com\r\nTo: a@example.com, b@example.org\r\nSubject: Status\r\nDate: "));
    assert!(data.contains("\r\nX-Priority: 3\r\nContent-Type: text/plain\r\n\r\n"));
    assert!(data.ends_with("\r\n\r\nHello,\r\n..signature follows\r\nBye\r\n.\r\nQUIT\r\n"));
}

#[tokio::test]
async fn test_rejected_recipient_stops_before_data() {
    init_tracing();
    let replies = concat!(
        "220 ready\r\n",
        "250 hello\r\n",
        "334 VXNlcm5hbWU6\r\n",
        "334 UGFzc3dvcmQ6\r\n",
        "235 ok\r\n",
        "250 sender ok\r\n",
        "550 5.1.1 No such user\r\n",
    );
    let (stream, sent) = MockStream::new(replies);
    let message = OutgoingMessage::new("me@example.com")
        .to("ghost@example.com")
        .to("b@example.org")
        .body("hi");

    let err = mailer()
        .send_over(LineStream::new(stream), &message)
        .await
        .unwrap_err();

    match &err {
        Error::Submission { step, response } => {
            assert_eq!(*step, Step::DeclareRecipients);
            assert_eq!(response, "550 5.1.1 No such user");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("declare-recipients"));

    let text = sent_text(&sent);
    assert!(text.ends_with("RCPT TO:<ghost@example.com>\r\n"));
    assert!(!text.contains("DATA"));
    assert!(!text.contains("b@example.org"));
}

#[tokio::test]
async fn test_rejected_sender() {
    let replies = concat!(
        "220 ready\r\n",
        "250 hello\r\n",
        "334 VXNlcm5hbWU6\r\n",
        "334 UGFzc3dvcmQ6\r\n",
        "235 ok\r\n",
        "553 sender not allowed\r\n",
    );
    let (stream, sent) = MockStream::new(replies);
    let message = OutgoingMessage::new("me@example.com").to("a@example.com");

    let err = mailer()
        .send_over(LineStream::new(stream), &message)
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some(Step::DeclareSender));
    assert!(!sent_text(&sent).contains("RCPT"));
}

#[tokio::test]
async fn test_quit_failure_reports_close_step() {
    let replies = HAPPY_REPLIES.replace("221 2.0.0 Bye", "500 what");
    let (stream, _sent) = MockStream::new(&replies);
    let message = OutgoingMessage::new("me@example.com").to("a@example.com");

    let err = mailer()
        .send_over(LineStream::new(stream), &message)
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some(Step::Close));
}

#[tokio::test]
async fn test_server_hangs_up_mid_sequence() {
    let (stream, _sent) = MockStream::new("220 ready\r\n");
    let message = OutgoingMessage::new("me@example.com").to("a@example.com");

    let err = mailer()
        .send_over(LineStream::new(stream), &message)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Transport(abrimail_transport::Error::EndOfStream)
    ));
}

#[tokio::test]
async fn test_invalid_message_fails_before_network() {
    // Empty host: reaching the network would fail with a settings error.
    let mailer = Mailer::new(ConnectionSettings::new("", 465, "me", "secret"));

    let no_recipients = OutgoingMessage::new("me@example.com").subject("x");
    assert!(matches!(
        mailer.send(&no_recipients).await,
        Err(Error::InvalidMessage(_))
    ));

    let bad_recipient = OutgoingMessage::new("me@example.com").to("not-an-address");
    assert!(matches!(
        mailer.send(&bad_recipient).await,
        Err(Error::InvalidAddress(_))
    ));

    let valid = OutgoingMessage::new("me@example.com").to("a@example.com");
    assert!(matches!(
        mailer.send(&valid).await,
        Err(Error::Transport(abrimail_transport::Error::Settings(_)))
    ));
}
