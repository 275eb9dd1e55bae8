//! Outgoing message composition and DATA encoding.

use chrono::{DateTime, Utc};

use crate::address::Address;
use crate::error::{Error, Result};

/// Content type used when none is set.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// A message to submit.
///
/// Setters never fail; [`OutgoingMessage::envelope`] and
/// [`OutgoingMessage::compose`] validate before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    from: String,
    to: Vec<String>,
    subject: String,
    body: String,
    content_type: String,
    headers: Vec<(String, String)>,
}

/// Validated sender and recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `MAIL FROM` address.
    pub sender: Address,
    /// `RCPT TO` addresses, in order.
    pub recipients: Vec<Address>,
}

impl OutgoingMessage {
    /// Starts a message from `from` with no recipients.
    #[must_use]
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: Vec::new(),
            subject: String::new(),
            body: String::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            headers: Vec::new(),
        }
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the content type, e.g. `text/html; charset=utf-8`.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Adds an extra header. Setting a name again replaces its value in
    /// place; names compare case-insensitively.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Sender as given.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.from
    }

    /// Recipients as given, in order.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.to
    }

    /// Extra headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Validates sender and recipients.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMessage`] with no recipients, [`Error::InvalidAddress`]
    /// for any malformed address.
    pub fn envelope(&self) -> Result<Envelope> {
        if self.to.is_empty() {
            return Err(Error::InvalidMessage("no recipients".to_string()));
        }

        Ok(Envelope {
            sender: Address::new(self.from.as_str())?,
            recipients: self
                .to
                .iter()
                .map(|r| Address::new(r.as_str()))
                .collect::<Result<_>>()?,
        })
    }

    /// Renders headers and body, CRLF line endings, without DATA framing.
    ///
    /// Order: `From`, `To`, `Subject`, `Date`, extra headers, `Content-Type`,
    /// blank line, body.
    ///
    /// # Errors
    ///
    /// As for [`OutgoingMessage::envelope`], plus [`Error::InvalidMessage`]
    /// if a header name or value would break the header block.
    pub fn compose(&self, date: DateTime<Utc>) -> Result<String> {
        let envelope = self.envelope()?;

        check_value("Subject", &self.subject)?;
        check_value("Content-Type", &self.content_type)?;
        for (name, value) in &self.headers {
            check_name(name)?;
            check_value(name, value)?;
        }

        let to = envelope
            .recipients
            .iter()
            .map(Address::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = String::with_capacity(self.body.len() + 256);
        push_header(&mut out, "From", envelope.sender.as_str());
        push_header(&mut out, "To", &to);
        push_header(&mut out, "Subject", &self.subject);
        push_header(&mut out, "Date", &date.to_rfc2822());
        for (name, value) in &self.headers {
            push_header(&mut out, name, value);
        }
        push_header(&mut out, "Content-Type", &self.content_type);
        out.push_str("\r\n");
        out.push_str(&self.body);

        Ok(out)
    }
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name
            .bytes()
            .any(|b| b == b':' || !b.is_ascii_graphic())
    {
        return Err(Error::InvalidMessage(format!("invalid header name: {name:?}")));
    }
    Ok(())
}

fn check_value(name: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidMessage(format!(
            "line break in {name} header"
        )));
    }
    Ok(())
}

/// Frames message content for the DATA phase.
///
/// Line endings become CRLF, lines starting with `.` get an extra `.`, and
/// the lone `.` terminator line is appended.
#[must_use]
pub fn encode_data(content: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + content.len() / 32 + 8);

    // `lines` accepts LF and CRLF and ignores one trailing terminator.
    for line in content.lines() {
        if line.starts_with('.') {
            out.push(b'.');
        }
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_compose_order() {
        let message = OutgoingMessage::new("me@example.com")
            .to("a@example.com")
            .to("b@example.org")
            .subject("Hello")
            .header("X-Mailer", "abrimail")
            .header("Reply-To", "me+reply@example.com")
            .body("Hi there\r\n");

        let text = message.compose(date()).unwrap();
        assert_eq!(
            text,
            format!(
                concat!(
                    "From: me@example.com\r\n",
                    "To: a@example.com, b@example.org\r\n",
                    "Subject: Hello\r\n",
                    "Date: {}\r\n",
                    "X-Mailer: abrimail\r\n",
                    "Reply-To: me+reply@example.com\r\n",
                    "Content-Type: text/plain\r\n",
                    "\r\n",
                    "Hi there\r\n",
                ),
                date().to_rfc2822()
            )
        );
        assert!(text.contains("Date: Tue, "));
    }

    #[test]
    fn test_header_replaced_in_place() {
        let message = OutgoingMessage::new("me@example.com")
            .header("X-A", "1")
            .header("X-B", "2")
            .header("x-a", "3");
        assert_eq!(
            message.headers(),
            &[
                ("X-A".to_string(), "3".to_string()),
                ("X-B".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_envelope_validation() {
        let no_recipients = OutgoingMessage::new("me@example.com");
        assert!(matches!(
            no_recipients.envelope(),
            Err(Error::InvalidMessage(_))
        ));

        let bad_sender = OutgoingMessage::new("me").to("a@example.com");
        assert!(matches!(bad_sender.envelope(), Err(Error::InvalidAddress(_))));

        let bad_recipient = OutgoingMessage::new("me@example.com").to("nobody");
        assert!(matches!(
            bad_recipient.envelope(),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_header_injection_rejected() {
        let message = OutgoingMessage::new("me@example.com")
            .to("a@example.com")
            .subject("hi\r\nBcc: victim@example.com");
        assert!(matches!(
            message.compose(date()),
            Err(Error::InvalidMessage(_))
        ));

        let message = OutgoingMessage::new("me@example.com")
            .to("a@example.com")
            .header("Bad Name", "x");
        assert!(matches!(
            message.compose(date()),
            Err(Error::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_encode_data_normalizes_and_stuffs() {
        let encoded = encode_data("line one\n.hidden\r\n..two\nlast");
        assert_eq!(
            encoded,
            b"line one\r\n..hidden\r\n...two\r\nlast\r\n.\r\n".to_vec()
        );
    }

    #[test]
    fn test_encode_data_trailing_newline() {
        assert_eq!(encode_data("body\r\n"), b"body\r\n.\r\n".to_vec());
        assert_eq!(encode_data(""), b".\r\n".to_vec());
        assert_eq!(encode_data("."), b"..\r\n.\r\n".to_vec());
    }
}
