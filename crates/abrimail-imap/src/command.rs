//! IMAP command builders and serialization.

use std::fmt;

use crate::tag::Tag;
use crate::{Error, Result};

/// Message sequence numbers `start:end` (a single number when equal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    start: u32,
    end: u32,
}

impl SequenceRange {
    /// A single message.
    #[must_use]
    pub const fn single(seq: u32) -> Self {
        Self {
            start: seq,
            end: seq,
        }
    }

    /// `count` messages starting at `start`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `start` or `count` is zero or the
    /// range overflows.
    pub fn from_count(start: u32, count: u32) -> Result<Self> {
        if start == 0 {
            return Err(Error::InvalidArgument(
                "sequence numbers start at 1".to_string(),
            ));
        }
        let end = count
            .checked_sub(1)
            .and_then(|extra| start.checked_add(extra))
            .ok_or_else(|| Error::InvalidArgument(format!("invalid range {start}+{count}")))?;
        Ok(Self { start, end })
    }

    /// First sequence number.
    #[must_use]
    pub const fn start(self) -> u32 {
        self.start
    }

    /// Last sequence number.
    #[must_use]
    pub const fn end(self) -> u32 {
        self.end
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

/// What a FETCH asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchItems {
    /// `(ENVELOPE FLAGS RFC822.SIZE)`.
    Summary,
    /// `(BODY[])`, the full message.
    FullBody,
    /// `(BODY[HEADER])`, the raw header block.
    Header,
}

impl FetchItems {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "(ENVELOPE FLAGS RFC822.SIZE)",
            Self::FullBody => "(BODY[])",
            Self::Header => "(BODY[HEADER])",
        }
    }
}

/// A command this client can send.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// `LOGIN "user" "pass"`.
    Login {
        /// Login name.
        username: String,
        /// Password (never logged).
        password: String,
    },
    /// `SELECT "mailbox"`.
    Select {
        /// Mailbox name.
        mailbox: String,
    },
    /// `FETCH set items`.
    Fetch {
        /// Messages to fetch.
        range: SequenceRange,
        /// Data items to fetch.
        items: FetchItems,
    },
    /// `NOOP`.
    Noop,
    /// `LOGOUT`.
    Logout,
}

impl Command {
    /// Command keyword.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Fetch { .. } => "FETCH",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
        }
    }

    /// Serializes the command as sent on the wire, CRLF included.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if a quoted argument contains CR, LF or
    /// NUL, which cannot be expressed as a quoted string.
    pub fn serialize(&self, tag: Tag) -> Result<Vec<u8>> {
        let mut buf = format!("{tag} {}", self.name()).into_bytes();

        match self {
            Self::Login { username, password } => {
                buf.push(b' ');
                write_quoted(&mut buf, username)?;
                buf.push(b' ');
                write_quoted(&mut buf, password)?;
            }
            Self::Select { mailbox } => {
                buf.push(b' ');
                write_quoted(&mut buf, mailbox)?;
            }
            Self::Fetch { range, items } => {
                buf.extend_from_slice(format!(" {range} {}", items.as_str()).as_bytes());
            }
            Self::Noop | Self::Logout => {}
        }

        buf.extend_from_slice(b"\r\n");
        Ok(buf)
    }

    /// The command line for logs and errors, password masked.
    #[must_use]
    pub fn masked(&self, tag: Tag) -> String {
        match self {
            Self::Login { username, .. } => {
                let mut buf = Vec::new();
                let user = write_quoted(&mut buf, username)
                    .map_or_else(|_| "\"?\"".to_string(), |()| {
                        String::from_utf8_lossy(&buf).into_owned()
                    });
                format!("{tag} LOGIN {user} ****")
            }
            _ => self.serialize(tag).map_or_else(
                |_| format!("{tag} {}", self.name()),
                |bytes| String::from_utf8_lossy(&bytes).trim_end().to_string(),
            ),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Select { mailbox } => f.debug_struct("Select").field("mailbox", mailbox).finish(),
            Self::Fetch { range, items } => f
                .debug_struct("Fetch")
                .field("range", range)
                .field("items", items)
                .finish(),
            Self::Noop => f.write_str("Noop"),
            Self::Logout => f.write_str("Logout"),
        }
    }
}

/// Writes `s` as a quoted string, escaping `"` and `\`.
fn write_quoted(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    if s.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
        return Err(Error::InvalidArgument(
            "quoted string cannot contain CR, LF or NUL".to_string(),
        ));
    }

    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');

    Ok(())
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
    use crate::tag::TagGenerator;

    fn tag() -> Tag {
        TagGenerator::new().next()
    }

    #[test]
    fn test_login_serialize() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "p\"a\\ss".to_string(),
        };
        assert_eq!(
            cmd.serialize(tag()).unwrap(),
            b"A001 LOGIN \"user@example.com\" \"p\\\"a\\\\ss\"\r\n"
        );
    }

    #[test]
    fn test_login_masked() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "hunter2".to_string(),
        };
        let masked = cmd.masked(tag());
        assert_eq!(masked, "A001 LOGIN \"user\" ****");
        assert!(!format!("{cmd:?}").contains("hunter2"));
    }

    #[test]
    fn test_select_serialize() {
        let cmd = Command::Select {
            mailbox: "INBOX".to_string(),
        };
        assert_eq!(cmd.serialize(tag()).unwrap(), b"A001 SELECT \"INBOX\"\r\n");
        assert_eq!(cmd.masked(tag()), "A001 SELECT \"INBOX\"");
    }

    #[test]
    fn test_fetch_serialize() {
        let cmd = Command::Fetch {
            range: SequenceRange::from_count(1, 10).unwrap(),
            items: FetchItems::Summary,
        };
        assert_eq!(
            cmd.serialize(tag()).unwrap(),
            b"A001 FETCH 1:10 (ENVELOPE FLAGS RFC822.SIZE)\r\n"
        );

        let cmd = Command::Fetch {
            range: SequenceRange::single(42),
            items: FetchItems::FullBody,
        };
        assert_eq!(cmd.serialize(tag()).unwrap(), b"A001 FETCH 42 (BODY[])\r\n");
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::Noop.serialize(tag()).unwrap(), b"A001 NOOP\r\n");
        assert_eq!(Command::Logout.serialize(tag()).unwrap(), b"A001 LOGOUT\r\n");
    }

    #[test]
    fn test_crlf_in_argument_rejected() {
        let cmd = Command::Select {
            mailbox: "INBOX\r\nA002 DELETE x".to_string(),
        };
        assert!(matches!(
            cmd.serialize(tag()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sequence_range() {
        assert!(SequenceRange::from_count(0, 5).is_err());
        assert!(SequenceRange::from_count(1, 0).is_err());
        assert!(SequenceRange::from_count(u32::MAX, 2).is_err());
        assert_eq!(SequenceRange::from_count(5, 1).unwrap().to_string(), "5");
        assert_eq!(SequenceRange::from_count(5, 3).unwrap().to_string(), "5:7");
    }
}
