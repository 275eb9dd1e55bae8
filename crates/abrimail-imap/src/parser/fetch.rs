//! FETCH response parsing.

use super::lexer::{Lexer, Token};
use crate::reader::ResponseUnit;
use crate::types::{Address, Envelope, FetchData};
use crate::{Error, Result};

/// Parses an untagged `* n FETCH (...)` unit.
///
/// Returns `Ok(None)` for any other untagged response, such as an
/// `EXISTS` update interleaved with the FETCH results.
///
/// # Errors
///
/// Returns a parse error if the unit is a FETCH response but malformed.
pub fn parse_fetch_unit(unit: &ResponseUnit) -> Result<Option<FetchData>> {
    let mut lexer = Lexer::new(unit);

    if lexer.next_token()? != Token::Asterisk || lexer.next_token()? != Token::Space {
        return Ok(None);
    }
    let Token::Number(seq) = lexer.next_token()? else {
        return Ok(None);
    };
    if lexer.next_token()? != Token::Space {
        return Ok(None);
    }
    match lexer.next_token()? {
        Token::Atom(name) if name.eq_ignore_ascii_case("FETCH") => {}
        _ => return Ok(None),
    }
    lexer.expect_space()?;

    let mut fetch = FetchData {
        seq,
        ..FetchData::default()
    };
    parse_fetch_items(&mut lexer, &mut fetch)?;

    Ok(Some(fetch))
}

/// Parses the parenthesized item list of a FETCH response.
fn parse_fetch_items(lexer: &mut Lexer<'_>, fetch: &mut FetchData) -> Result<()> {
    lexer.expect(Token::LParen)?;

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(name) => match name.to_ascii_uppercase().as_str() {
                "FLAGS" => {
                    lexer.expect_space()?;
                    fetch.flags = parse_flag_list(lexer)?;
                }
                "RFC822.SIZE" => {
                    lexer.expect_space()?;
                    fetch.size = Some(lexer.read_number()?);
                }
                "ENVELOPE" => {
                    lexer.expect_space()?;
                    fetch.envelope = Some(parse_envelope(lexer)?);
                }
                "BODY" | "BODY.PEEK" => {
                    let section = parse_section(lexer)?;
                    lexer.expect_space()?;
                    if let Some(data) = read_body_value(lexer)? {
                        fetch.bodies.push((section, data));
                    }
                }
                "RFC822" | "RFC822.HEADER" | "RFC822.TEXT" => {
                    let section = match name.to_ascii_uppercase().as_str() {
                        "RFC822.HEADER" => "HEADER",
                        "RFC822.TEXT" => "TEXT",
                        _ => "",
                    };
                    lexer.expect_space()?;
                    if let Some(data) = read_body_value(lexer)? {
                        fetch.bodies.push((section.to_string(), data));
                    }
                }
                _ => skip_fetch_item(lexer)?,
            },
            Token::Eof => return Err(lexer.error("Unterminated FETCH item list")),
            token => return Err(lexer.error(&format!("Unexpected token in FETCH: {token:?}"))),
        }
    }

    Ok(())
}

/// Reads `[section]` and an optional `<origin>` after `BODY`.
fn parse_section(lexer: &mut Lexer<'_>) -> Result<String> {
    lexer.expect(Token::LBracket)?;

    let mut section = String::new();
    loop {
        match lexer.advance() {
            Some(b']') => break,
            Some(b) => section.push(char::from(b)),
            None => return Err(lexer.error("Unterminated body section")),
        }
    }

    if lexer.peek() == Some(b'<') {
        while let Some(b) = lexer.advance() {
            if b == b'>' {
                break;
            }
        }
    }

    Ok(section)
}

/// Reads a body value: literal, quoted string or NIL.
fn read_body_value(lexer: &mut Lexer<'_>) -> Result<Option<Vec<u8>>> {
    match lexer.next_token()? {
        Token::Literal(data) => Ok(Some(data.to_vec())),
        Token::QuotedString(s) => Ok(Some(s.into_bytes())),
        Token::Nil => Ok(None),
        token => Err(lexer.error(&format!("Expected body data, got {token:?}"))),
    }
}

/// Parses a flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    lexer.expect(Token::LParen)?;

    let mut flags = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => flags.push(s.to_string()),
            Token::Space => {}
            token => {
                return Err(lexer.error(&format!("Unexpected token in flag list: {token:?}")));
            }
        }
    }

    Ok(flags)
}

/// Parses an envelope structure.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;

    let date = lexer.read_nstring()?;
    lexer.expect_space()?;

    let subject = lexer.read_nstring()?;
    lexer.expect_space()?;

    let from = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let sender = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let reply_to = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let to = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let cc = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let bcc = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;

    let message_id = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

/// Parses an address list (NIL or a parenthesized list of addresses).
pub fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();

            loop {
                match lexer.peek() {
                    Some(b')') => {
                        lexer.advance();
                        break;
                    }
                    Some(b'(') => addresses.push(parse_address(lexer)?),
                    Some(b' ') => {
                        lexer.advance();
                    }
                    _ => return Err(lexer.error("Malformed address list")),
                }
            }

            Ok(addresses)
        }
        token => Err(Error::Parse {
            position: lexer.position(),
            message: format!("Expected address list, got {token:?}"),
        }),
    }
}

/// Parses a single address.
pub fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    lexer.expect(Token::LParen)?;

    let name = lexer.read_nstring()?;
    lexer.expect_space()?;

    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;

    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;

    let host = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}

/// Skips an unknown fetch item value.
fn skip_fetch_item(lexer: &mut Lexer<'_>) -> Result<()> {
    if lexer.peek() == Some(b' ') {
        lexer.advance();
    }

    let mut depth = 0usize;

    loop {
        match lexer.peek() {
            Some(b'(') => {
                depth += 1;
                lexer.advance();
            }
            Some(b')') => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                lexer.advance();
            }
            Some(b' ') if depth == 0 => break,
            // Literals and quoted strings may contain parentheses.
            Some(b'{' | b'"') => {
                lexer.next_token()?;
            }
            Some(_) => {
                lexer.advance();
            }
            None => break,
        }
    }

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

    fn parse(wire: &[u8]) -> Result<Option<FetchData>> {
        parse_fetch_unit(&ResponseUnit::from_wire(wire))
    }

    const ENVELOPE_UNIT: &[u8] = b"* 12 FETCH (FLAGS (\\Seen \\Answered) RFC822.SIZE 4096 ENVELOPE (\"Tue, 5 Mar 2024 12:30:00 +0100\" \"Quarterly report\" ((\"Alice Smith\" NIL \"alice\" \"example.com\")) ((\"Alice Smith\" NIL \"alice\" \"example.com\")) NIL ((NIL NIL \"bob\" \"example.org\")(\"Carol\" NIL \"carol\" \"example.net\")) NIL NIL NIL \"<id@example.com>\"))\r\n";

    #[test]
    fn test_parse_envelope_fetch() {
        let fetch = parse(ENVELOPE_UNIT).unwrap().unwrap();

        assert_eq!(fetch.seq, 12);
        assert_eq!(fetch.flags, vec!["\\Seen", "\\Answered"]);
        assert_eq!(fetch.size, Some(4096));

        let envelope = fetch.envelope.unwrap();
        assert_eq!(envelope.subject.as_deref(), Some("Quarterly report"));
        assert_eq!(envelope.from.len(), 1);
        assert_eq!(envelope.from[0].to_string(), "Alice Smith <alice@example.com>");
        assert_eq!(envelope.to.len(), 2);
        assert_eq!(envelope.to[1].email().as_deref(), Some("carol@example.net"));
        assert_eq!(envelope.message_id.as_deref(), Some("<id@example.com>"));
        assert!(envelope.cc.is_empty());
    }

    #[test]
    fn test_parse_subject_literal() {
        let unit = b"* 1 FETCH (ENVELOPE (NIL {11}\r\nHello (you) NIL NIL NIL NIL NIL NIL NIL NIL))\r\n";
        let fetch = parse(unit).unwrap().unwrap();
        let envelope = fetch.envelope.unwrap();
        assert_eq!(envelope.subject.as_deref(), Some("Hello (you)"));
        assert!(envelope.date.is_none());
    }

    #[test]
    fn test_parse_body_sections() {
        let unit = b"* 3 FETCH (UID 99 BODY[HEADER] {8}\r\nA: 1\r\n\r\n BODY[]<0> \"x\")\r\n";
        let fetch = parse(unit).unwrap().unwrap();
        assert_eq!(fetch.seq, 3);
        assert_eq!(fetch.body("header"), Some(&b"A: 1\r\n\r\n"[..]));
        assert_eq!(fetch.body(""), Some(&b"x"[..]));
    }

    #[test]
    fn test_skips_unknown_items() {
        let unit = b"* 2 FETCH (X-GM-LABELS (\"(odd)\" \\Inbox) INTERNALDATE \"01-Jan-2024 00:00:00 +0000\" RFC822.SIZE 10)\r\n";
        let fetch = parse(unit).unwrap().unwrap();
        assert_eq!(fetch.size, Some(10));
    }

    #[test]
    fn test_non_fetch_units() {
        assert_eq!(parse(b"* 5 EXISTS\r\n").unwrap(), None);
        assert_eq!(parse(b"* OK still here\r\n").unwrap(), None);
        assert_eq!(parse(b"A001 OK done\r\n").unwrap(), None);
    }

    #[test]
    fn test_malformed_fetch_is_error() {
        assert!(parse(b"* 5 FETCH (FLAGS (\\Seen)\r\n").is_err());
        assert!(parse(b"* 5 FETCH (ENVELOPE (\"x\"))\r\n").is_err());
    }
}
