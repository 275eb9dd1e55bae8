//! Mailbox and message summary types.

use std::fmt;

/// State of a selected mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxInfo {
    /// Mailbox name as passed to SELECT.
    pub name: String,
    /// Number of messages (`* n EXISTS`).
    pub message_count: u32,
    /// Number of recent messages (`* n RECENT`).
    pub recent_count: u32,
    /// Whether the server granted read-only access.
    pub read_only: bool,
}

/// Address from an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route (obsolete).
    pub adl: Option<String>,
    /// Mailbox name (local part).
    pub mailbox: Option<String>,
    /// Host name (domain part).
    pub host: Option<String>,
}

impl Address {
    /// Returns `mailbox@host`, if both parts are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let email = self.email().or_else(|| self.mailbox.clone());
        match (self.name.as_deref().filter(|n| !n.is_empty()), email) {
            (Some(name), Some(email)) => write!(f, "{name} <{email}>"),
            (Some(name), None) => f.write_str(name),
            (None, Some(email)) => f.write_str(&email),
            (None, None) => Ok(()),
        }
    }
}

/// Envelope structure of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Date header.
    pub date: Option<String>,
    /// Subject header.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// CC addresses.
    pub cc: Vec<Address>,
    /// BCC addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Items parsed from one `* n FETCH (...)` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchData {
    /// Message sequence number.
    pub seq: u32,
    /// Flags, verbatim.
    pub flags: Vec<String>,
    /// RFC822.SIZE.
    pub size: Option<u32>,
    /// ENVELOPE.
    pub envelope: Option<Envelope>,
    /// `BODY[section]` payloads keyed by section (empty for `BODY[]`).
    pub bodies: Vec<(String, Vec<u8>)>,
}

impl FetchData {
    /// Payload of `BODY[section]`, if it was returned.
    #[must_use]
    pub fn body(&self, section: &str) -> Option<&[u8]> {
        self.bodies
            .iter()
            .find(|(s, _)| s.eq_ignore_ascii_case(section))
            .map(|(_, data)| data.as_slice())
    }
}

/// Summary of one message for list views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRecord {
    /// Message sequence number (1-based).
    pub seq: u32,
    /// Subject, empty if absent.
    pub subject: String,
    /// From addresses, comma separated.
    pub from: String,
    /// To addresses, comma separated.
    pub to: String,
    /// Date header as sent.
    pub date: String,
    /// Size in bytes.
    pub size: u64,
    /// Whether `\Seen` is set.
    pub is_read: bool,
    /// All flags, verbatim.
    pub flags: Vec<String>,
}

impl From<FetchData> for HeaderRecord {
    fn from(data: FetchData) -> Self {
        let envelope = data.envelope.unwrap_or_default();
        let join = |addresses: &[Address]| {
            addresses
                .iter()
                .map(ToString::to_string)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        };

        Self {
            seq: data.seq,
            subject: envelope.subject.unwrap_or_default(),
            from: join(&envelope.from),
            to: join(&envelope.to),
            date: envelope.date.unwrap_or_default(),
            size: data.size.map_or(0, u64::from),
            is_read: data
                .flags
                .iter()
                .any(|flag| flag.eq_ignore_ascii_case("\\Seen")),
            flags: data.flags,
        }
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

    fn address(name: Option<&str>, mailbox: &str, host: Option<&str>) -> Address {
        Address {
            name: name.map(str::to_string),
            adl: None,
            mailbox: Some(mailbox.to_string()),
            host: host.map(str::to_string),
        }
    }

    #[test]
    fn test_address_display() {
        assert_eq!(
            address(Some("Alice"), "alice", Some("example.com")).to_string(),
            "Alice <alice@example.com>"
        );
        assert_eq!(
            address(None, "bob", Some("example.com")).to_string(),
            "bob@example.com"
        );
        assert_eq!(address(Some(""), "team", None).to_string(), "team");
    }

    #[test]
    fn test_header_record_from_fetch() {
        let data = FetchData {
            seq: 4,
            flags: vec!["\\Seen".to_string(), "\\Flagged".to_string()],
            size: Some(2048),
            envelope: Some(Envelope {
                date: Some("Mon, 1 Jan 2024 10:00:00 +0000".to_string()),
                subject: Some("Report".to_string()),
                from: vec![address(Some("Alice"), "alice", Some("a.com"))],
                to: vec![
                    address(None, "bob", Some("b.com")),
                    address(None, "carol", Some("c.com")),
                ],
                ..Envelope::default()
            }),
            bodies: Vec::new(),
        };

        let record = HeaderRecord::from(data);
        assert_eq!(record.seq, 4);
        assert_eq!(record.subject, "Report");
        assert_eq!(record.from, "Alice <alice@a.com>");
        assert_eq!(record.to, "bob@b.com, carol@c.com");
        assert_eq!(record.size, 2048);
        assert!(record.is_read);
        assert_eq!(record.flags.len(), 2);
    }

    #[test]
    fn test_header_record_without_envelope() {
        let record = HeaderRecord::from(FetchData {
            seq: 1,
            ..FetchData::default()
        });
        assert!(record.subject.is_empty());
        assert!(!record.is_read);
        assert_eq!(record.size, 0);
    }
}
