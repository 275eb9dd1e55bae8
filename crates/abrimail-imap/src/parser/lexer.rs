//! Tokenizer over one response unit.
//!
//! The reader has already split the unit into protocol lines and literal
//! payloads, so a `{n}` marker here is matched with the payload that
//! follows it instead of being counted out of the byte stream again.

#![allow(clippy::missing_errors_doc)]

use crate::reader::{Part, ResponseUnit};
use crate::{Error, Result};

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Bare word, flags included (`FETCH`, `\Seen`, `RFC822.SIZE`).
    Atom(&'a str),
    /// Quoted string with escapes resolved.
    QuotedString(String),
    /// Literal payload, borrowed from the unit.
    Literal(&'a [u8]),
    /// All-digit atom.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// A single space.
    Space,
    /// `*`
    Asterisk,
    /// `NIL`, any case.
    Nil,
    /// Line terminator.
    Crlf,
    /// Nothing left in the unit.
    Eof,
}

/// Cursor over the lines of a [`ResponseUnit`].
///
/// Byte-level methods ([`Lexer::peek`], [`Lexer::advance`]) only see
/// protocol lines; literal payloads are reachable through
/// [`Lexer::next_token`] alone.
pub struct Lexer<'a> {
    parts: &'a [Part],
    index: usize,
    pos: usize,
    offset: usize,
}

impl<'a> Lexer<'a> {
    /// Starts at the first byte of `unit`.
    #[must_use]
    pub fn new(unit: &'a ResponseUnit) -> Self {
        Self {
            parts: unit.parts(),
            index: 0,
            pos: 0,
            offset: 0,
        }
    }

    /// Bytes consumed so far, literals included.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.offset
    }

    fn line(&self) -> &'a [u8] {
        let parts = self.parts;
        match parts.get(self.index) {
            Some(Part::Line(line)) => line,
            _ => &[],
        }
    }

    /// The next byte on the current line, if any.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.line().get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.line().get(self.pos + ahead).copied()
    }

    /// Consumes one byte, moving to the next line at the end of this one.
    ///
    /// A literal reached this way is stepped over unread.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        self.offset += 1;
        if self.pos == self.line().len() {
            self.next_line();
        }
        Some(byte)
    }

    fn next_line(&mut self) {
        self.index += 1;
        self.pos = 0;
        if let Some(Part::Literal(data)) = self.parts.get(self.index) {
            self.offset += data.len();
            self.index += 1;
        }
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let single = match byte {
            b' ' => Some(Token::Space),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'*' => Some(Token::Asterisk),
            b'\n' => Some(Token::Crlf),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match byte {
            b'\r' if self.peek_at(1) == Some(b'\n') => {
                self.advance();
                self.advance();
                Ok(Token::Crlf)
            }
            b'"' => self.quoted(),
            b'{' => self.literal(),
            _ if is_atom_char(byte) => self.atom(),
            _ => Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        }
    }

    fn quoted(&mut self) -> Result<Token<'a>> {
        self.advance();

        let mut text = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => text.push(c),
                    Some(c) => {
                        return Err(self.error(&format!("Invalid escape: \\{}", char::from(c))));
                    }
                    None => return Err(self.error("Unterminated quoted string")),
                },
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error("Unterminated quoted string"));
                }
                Some(c) => text.push(c),
            }
        }

        // Servers do send raw 8-bit header text here.
        Ok(Token::QuotedString(String::from_utf8_lossy(&text).into_owned()))
    }

    /// `{n}` at the end of a line, paired with the payload after it.
    fn literal(&mut self) -> Result<Token<'a>> {
        let parts = self.parts;
        let line = self.line();
        let rest = &line[self.pos + 1..];
        let close = rest
            .iter()
            .position(|&b| b == b'}')
            .ok_or_else(|| self.error("Unterminated literal marker"))?;

        let announced: usize = std::str::from_utf8(&rest[..close])
            .ok()
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| self.error("Invalid literal size"))?;

        let tail = &rest[close + 1..];
        if !matches!(tail, b"\r\n" | b"\n" | b"") {
            return Err(self.error("Literal marker not at end of line"));
        }

        let Some(Part::Literal(data)) = parts.get(self.index + 1) else {
            return Err(self.error("Literal marker without payload"));
        };
        if data.len() != announced {
            return Err(self.error(&format!(
                "Literal announced {announced} bytes but carries {}",
                data.len()
            )));
        }

        self.offset += line.len() - self.pos + data.len();
        self.index += 2;
        self.pos = 0;

        Ok(Token::Literal(data))
    }

    fn atom(&mut self) -> Result<Token<'a>> {
        let line = self.line();
        let start = self.pos;
        let len = line[start..]
            .iter()
            .position(|&b| !is_atom_char(b))
            .unwrap_or(line.len() - start);

        let word = std::str::from_utf8(&line[start..start + len])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))?;
        for _ in 0..len {
            self.advance();
        }

        if word.eq_ignore_ascii_case("NIL") {
            return Ok(Token::Nil);
        }
        if word.bytes().all(|b| b.is_ascii_digit()) {
            return word
                .parse()
                .map(Token::Number)
                .map_err(|_| self.error("Number too large"));
        }
        Ok(Token::Atom(word))
    }

    /// A parse error at the current position.
    pub fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.offset,
            message: message.to_string(),
        }
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected {expected:?}, got {token:?}")))
        }
    }

    /// Consumes one space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// `NIL`, a quoted string or a literal.
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::QuotedString(s) => Ok(Some(s)),
            Token::Literal(data) => Ok(Some(String::from_utf8_lossy(data).into_owned())),
            token => Err(self.error(&format!("Expected nstring, got {token:?}"))),
        }
    }

    /// A number token.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(&format!("Expected number, got {token:?}"))),
        }
    }
}

/// ATOM-CHAR, widened with `\` so flags lex as one atom.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    b > 0x20
        && b < 0x7F
        && !matches!(b, b'(' | b')' | b'{' | b'"' | b'%' | b'*' | b'[' | b']')
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

    fn tokens(wire: &[u8]) -> Vec<Token<'static>> {
        let unit: &'static ResponseUnit = Box::leak(Box::new(ResponseUnit::from_wire(wire)));
        let mut lexer = Lexer::new(unit);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn test_untagged_fetch_prefix() {
        assert_eq!(
            tokens(b"* 12 FETCH (\r\n"),
            [
                Token::Asterisk,
                Token::Space,
                Token::Number(12),
                Token::Space,
                Token::Atom("FETCH"),
                Token::Space,
                Token::LParen,
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn test_quoted_string_escaped() {
        assert_eq!(
            tokens(b"\"hello \\\"world\\\"\""),
            [Token::QuotedString("hello \"world\"".to_string())]
        );
    }

    #[test]
    fn test_quoted_string_invalid_utf8_replaced() {
        assert_eq!(
            tokens(b"\"caf\xe9\""),
            [Token::QuotedString("caf\u{FFFD}".to_string())]
        );
    }

    #[test]
    fn test_quoted_string_cannot_span_lines() {
        let unit = ResponseUnit::from_wire(b"\"open\r\n");
        let mut lexer = Lexer::new(&unit);
        assert!(matches!(lexer.next_token(), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_nil_and_flags() {
        assert_eq!(
            tokens(b"NIL nil (\\Seen $Forwarded)"),
            [
                Token::Nil,
                Token::Space,
                Token::Nil,
                Token::Space,
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::Space,
                Token::Atom("$Forwarded"),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_literal_continues_on_next_line() {
        assert_eq!(
            tokens(b"X {7}\r\nhe\r\nlo)\r\n"),
            [
                Token::Atom("X"),
                Token::Space,
                Token::Literal(b"he\r\nlo)"),
                Token::RParen,
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn test_empty_literal() {
        assert_eq!(
            tokens(b"{0}\r\n NIL\r\n"),
            [Token::Literal(b""), Token::Space, Token::Nil, Token::Crlf]
        );
    }

    #[test]
    fn test_short_literal_is_error() {
        let unit = ResponseUnit::from_wire(b"{10}\r\nshort");
        let mut lexer = Lexer::new(&unit);
        assert!(matches!(lexer.next_token(), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_advance_steps_over_literal() {
        let unit = ResponseUnit::from_wire(b"A {3}\r\n)))B\r\n");
        let mut lexer = Lexer::new(&unit);
        let mut seen = Vec::new();
        while let Some(b) = lexer.advance() {
            seen.push(b);
        }
        assert_eq!(seen, b"A {3}\r\nB\r\n");
        assert_eq!(lexer.position(), unit.len());
    }

    #[test]
    fn test_is_atom_char() {
        assert!(is_atom_char(b'A'));
        assert!(is_atom_char(b'.'));
        assert!(is_atom_char(b'\\'));
        assert!(!is_atom_char(b' '));
        assert!(!is_atom_char(b'('));
        assert!(!is_atom_char(b'['));
        assert!(!is_atom_char(b']'));
        assert!(!is_atom_char(b'"'));
        assert!(!is_atom_char(b'%'));
        assert!(!is_atom_char(b'{'));
        assert!(!is_atom_char(0x7F));
    }
}
