//! Server replies.
//!
//! A reply is one or more lines sharing a three-digit code. A space after
//! the code ends the reply and any other character continues it; servers
//! send `-`:
//!
//! ```text
//! 250-smtp.example.com Hello
//! 250-AUTH LOGIN PLAIN
//! 250 8BITMIME
//! ```

use std::fmt;

use crate::error::{Error, Result};

/// A complete server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Code shared by every line.
    pub code: ReplyCode,
    /// Text after the code on each line, in order.
    pub message: Vec<String>,
}

/// Renders the final line as the server sent it, e.g. `550 No such user`.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message.last().map(String::as_str) {
            Some(text) if !text.is_empty() => write!(f, "{} {text}", self.code),
            _ => write!(f, "{}", self.code),
        }
    }
}

/// Three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220, greeting.
    pub const SERVICE_READY: Self = Self(220);
    /// 221, answer to QUIT.
    pub const CLOSING: Self = Self(221);
    /// 235, AUTH accepted.
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250, command accepted.
    pub const OK: Self = Self(250);
    /// 251, recipient accepted for forwarding.
    pub const FORWARD: Self = Self(251);
    /// 334, AUTH challenge.
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354, go ahead with the message.
    pub const START_DATA: Self = Self(354);

    /// The numeric value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// Builds a [`Reply`] from its lines, terminators already stripped.
///
/// # Errors
///
/// [`Error::Protocol`] for no lines, a code that is not three digits, or
/// lines that disagree on the code.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("empty reply".to_string()));
    };

    let digits = first
        .get(..3)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::Protocol(format!("bad reply code: {first}")))?;
    let code = digits
        .parse()
        .map_err(|_| Error::Protocol(format!("bad reply code: {first}")))?;

    let message = lines
        .iter()
        .map(|line| {
            if !line.starts_with(digits) {
                return Err(Error::Protocol(format!("reply code changed mid-reply: {line}")));
            }
            // Drop the separator, whatever it is.
            let mut rest = line.get(3..).unwrap_or_default().chars();
            rest.next();
            Ok(rest.as_str().to_string())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Reply {
        code: ReplyCode(code),
        message,
    })
}

/// True when a space, or nothing, follows the code.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    matches!(line.as_bytes().get(3), None | Some(b' '))
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

    fn parse(raw: &[&str]) -> Result<Reply> {
        let lines: Vec<String> = raw.iter().map(ToString::to_string).collect();
        parse_reply(&lines)
    }

    #[test]
    fn test_single_line() {
        let reply = parse(&["250 2.1.0 Sender OK"]).unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.message, ["2.1.0 Sender OK"]);
        assert_eq!(reply.to_string(), "250 2.1.0 Sender OK");
    }

    #[test]
    fn test_ehlo_capabilities() {
        let reply = parse(&[
            "250-smtp.example.com Hello",
            "250-AUTH LOGIN PLAIN",
            "250 8BITMIME",
        ])
        .unwrap();
        assert_eq!(reply.code.value(), 250);
        assert_eq!(
            reply.message,
            ["smtp.example.com Hello", "AUTH LOGIN PLAIN", "8BITMIME"]
        );
        assert_eq!(reply.to_string(), "250 8BITMIME");
    }

    #[test]
    fn test_bare_code() {
        let reply = parse(&["354"]).unwrap();
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.to_string(), "354");
    }

    #[test]
    fn test_last_line_detection() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("250"));
        assert!(!is_last_reply_line("250-more to come"));
        assert!(!is_last_reply_line("250_more to come"));
        assert!(!is_last_reply_line("250+more"));
    }

    #[test]
    fn test_any_separator_continues() {
        let reply = parse(&["250_smtp.example.com", "250=SIZE 1000", "250 OK"]).unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.message, ["smtp.example.com", "SIZE 1000", "OK"]);

        let reply = parse(&["250\u{e9}tat", "250 fin"]).unwrap();
        assert_eq!(reply.message, ["tat", "fin"]);
    }

    #[test]
    fn test_rejects_malformed_replies() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["25"]).is_err());
        assert!(parse(&["ABC OK"]).is_err());
        assert!(parse(&["+12 OK"]).is_err());
        assert!(parse(&["250-a", "251 b"]).is_err());
    }
}
