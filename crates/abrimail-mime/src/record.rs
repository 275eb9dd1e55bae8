//! Fetched message records.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::error::{Error, Result};
use crate::header::{Headers, split_headers_and_body};

/// Content type assumed when the message does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// A complete message as retrieved from the mailbox.
///
/// The raw bytes are fixed at construction. Every other field stays empty
/// until [`parse`](Self::parse) runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    id: u32,
    raw: Vec<u8>,
    headers: Headers,
    subject: String,
    from: String,
    to: String,
    date: String,
    content_type: String,
    body: String,
    parsed: bool,
}

impl MessageRecord {
    /// Creates an unparsed record for message sequence number `id`.
    #[must_use]
    pub fn new(id: u32, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            raw: raw.into(),
            headers: Headers::new(),
            subject: String::new(),
            from: String::new(),
            to: String::new(),
            date: String::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            body: String::new(),
            parsed: false,
        }
    }

    /// Creates a record and parses it immediately.
    #[must_use]
    pub fn parsed(id: u32, raw: impl Into<Vec<u8>>) -> Self {
        let mut record = Self::new(id, raw);
        record.parse();
        record
    }

    /// Splits the raw content and promotes the well-known headers.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. Parsing twice yields
    /// the same result.
    pub fn parse(&mut self) {
        let text = String::from_utf8_lossy(&self.raw);
        let (headers, body) = split_headers_and_body(&text);

        let field = |name: &str| headers.get(name).unwrap_or_default().to_string();
        self.subject = field("subject");
        self.from = field("from");
        self.to = field("to");
        self.date = field("date");
        self.content_type = headers
            .get("content-type")
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        debug!(
            id = self.id,
            headers = headers.len(),
            body_len = body.len(),
            "parsed message"
        );

        self.headers = headers;
        self.body = body;
        self.parsed = true;
    }

    /// Returns true once [`parse`](Self::parse) has run.
    #[must_use]
    pub const fn is_parsed(&self) -> bool {
        self.parsed
    }

    /// Message sequence number (1-based).
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Raw RFC 822 bytes exactly as received.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Raw content decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn raw_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }

    /// All parsed headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Looks up any header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Subject header.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// From header.
    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    /// To header.
    #[must_use]
    pub fn to(&self) -> &str {
        &self.to
    }

    /// Date header as sent.
    #[must_use]
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Content type without parameters, `text/plain` if absent.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Message body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Interprets the date header as RFC 2822.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHeader`] if there is no date, or
    /// [`Error::InvalidDate`] if it cannot be parsed.
    pub fn date_time(&self) -> Result<DateTime<FixedOffset>> {
        if self.date.is_empty() {
            return Err(Error::MissingHeader("date".to_string()));
        }
        Ok(DateTime::parse_from_rfc2822(&self.date)?)
    }
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
    use chrono::{Datelike, Timelike};

    const SAMPLE: &str = concat!(
        "From: Alice <alice@example.com>\r\n",
        "To: bob@example.com\r\n",
        "Subject: Lunch?\r\n",
        "Date: Tue, 5 Mar 2024 12:30:00 +0100\r\n",
        "Content-Type: text/html; charset=utf-8\r\n",
        "X-Mailer: test\r\n",
        "\r\n",
        "<p>Noon works.</p>\r\n",
    );

    #[test]
    fn test_new_is_unparsed() {
        let record = MessageRecord::new(7, SAMPLE);
        assert!(!record.is_parsed());
        assert_eq!(record.id(), 7);
        assert!(record.subject().is_empty());
        assert!(record.body().is_empty());
        assert_eq!(record.content_type(), DEFAULT_CONTENT_TYPE);
        assert_eq!(record.raw(), SAMPLE.as_bytes());
    }

    #[test]
    fn test_parse_promotes_fields() {
        let record = MessageRecord::parsed(1, SAMPLE);
        assert!(record.is_parsed());
        assert_eq!(record.from(), "Alice <alice@example.com>");
        assert_eq!(record.to(), "bob@example.com");
        assert_eq!(record.subject(), "Lunch?");
        assert_eq!(record.date(), "Tue, 5 Mar 2024 12:30:00 +0100");
        assert_eq!(record.content_type(), "text/html");
        assert_eq!(record.header("X-Mailer"), Some("test"));
        assert_eq!(record.body(), "<p>Noon works.</p>");
    }

    #[test]
    fn test_parse_twice_is_stable() {
        let mut record = MessageRecord::parsed(1, SAMPLE);
        let first = record.clone();
        record.parse();
        assert_eq!(record, first);
    }

    #[test]
    fn test_missing_content_type_defaults() {
        let record = MessageRecord::parsed(1, "Subject: hi\n\nbody");
        assert_eq!(record.content_type(), "text/plain");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut raw = b"Subject: caf".to_vec();
        raw.push(0xE9);
        raw.extend_from_slice(b"\n\nbody");

        let record = MessageRecord::parsed(1, raw.clone());
        assert_eq!(record.raw(), raw.as_slice());
        assert_eq!(record.subject(), "caf\u{FFFD}");
        assert_eq!(record.body(), "body");
    }

    #[test]
    fn test_date_time() {
        let record = MessageRecord::parsed(1, SAMPLE);
        let date = record.date_time().unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 3);
        assert_eq!(date.hour(), 12);
    }

    #[test]
    fn test_date_time_errors() {
        let record = MessageRecord::parsed(1, "Subject: x\n\n");
        assert!(matches!(record.date_time(), Err(Error::MissingHeader(_))));

        let record = MessageRecord::parsed(1, "Date: yesterday\n\n");
        assert!(matches!(record.date_time(), Err(Error::InvalidDate(_))));
    }
}
