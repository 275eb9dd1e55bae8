//! Tagged response reader.
//!
//! Collects everything the server sends for one command: zero or more
//! untagged response units followed by the tagged completion line. A unit
//! is one logical response, possibly spanning several wire lines when
//! literals are embedded in it.

use std::borrow::Cow;

use abrimail_transport::LineStream;
use abrimail_transport::line::MAX_LITERAL_SIZE;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

use crate::literal::{LineKind, classify};
use crate::tag::Tag;
use crate::{Error, Result};

/// One piece of a response unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// A protocol line, terminator included.
    Line(Vec<u8>),
    /// Raw literal bytes, exactly as announced.
    Literal(Vec<u8>),
}

/// One logical server response.
///
/// Always starts with a line; every line announcing a literal is followed
/// by that literal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseUnit {
    parts: Vec<Part>,
}

impl ResponseUnit {
    /// All parts in wire order.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// The first line of the unit.
    #[must_use]
    pub fn first_line(&self) -> &[u8] {
        match self.parts.first() {
            Some(Part::Line(line)) => line,
            _ => &[],
        }
    }

    /// The first line without its terminator, decoded lossily.
    #[must_use]
    pub fn first_line_text(&self) -> Cow<'_, str> {
        let line = self.first_line();
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        String::from_utf8_lossy(line)
    }

    /// Splits one already-buffered unit the way [`read_unit`] would.
    ///
    /// A literal running past the end of `wire` keeps only the bytes that
    /// are there.
    #[must_use]
    pub fn from_wire(wire: &[u8]) -> Self {
        let mut parts = Vec::new();
        let mut rest = wire;

        while !rest.is_empty() {
            let end = rest
                .iter()
                .position(|&b| b == b'\n')
                .map_or(rest.len(), |i| i + 1);
            let (line, tail) = rest.split_at(end);
            parts.push(Part::Line(line.to_vec()));
            rest = tail;

            if let LineKind::Literal(len) = classify(line) {
                let (data, tail) = rest.split_at(len.min(rest.len()));
                parts.push(Part::Literal(data.to_vec()));
                rest = tail;
            }
        }

        Self { parts }
    }

    /// Iterates over the literal payloads.
    pub fn literals(&self) -> impl Iterator<Item = &[u8]> {
        self.parts.iter().filter_map(|part| match part {
            Part::Literal(data) => Some(data.as_slice()),
            Part::Line(_) => None,
        })
    }

    /// Returns the literal announced by the first line containing `marker`.
    #[must_use]
    pub fn literal_after(&self, marker: &str) -> Option<&[u8]> {
        let marker = marker.as_bytes();
        self.parts.windows(2).find_map(|pair| match pair {
            [Part::Line(line), Part::Literal(data)]
                if line.windows(marker.len()).any(|w| w == marker) =>
            {
                Some(data.as_slice())
            }
            _ => None,
        })
    }

    /// The unit as it appeared on the wire.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        for part in &self.parts {
            match part {
                Part::Line(data) | Part::Literal(data) => buf.extend_from_slice(data),
            }
        }
        buf.freeze()
    }

    /// Total size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts
            .iter()
            .map(|part| match part {
                Part::Line(data) | Part::Literal(data) => data.len(),
            })
            .sum()
    }

    /// Returns true if the unit holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Status word of a tagged completion line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed.
    No,
    /// Command was rejected as malformed.
    Bad,
    /// Any other word, kept verbatim.
    Other(String),
}

impl Status {
    fn parse(word: &str) -> Self {
        match word.to_ascii_uppercase().as_str() {
            "OK" => Self::Ok,
            "NO" => Self::No,
            "BAD" => Self::Bad,
            _ => Self::Other(word.to_string()),
        }
    }

    /// Returns true for `OK`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Everything received for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedResponse {
    /// Untagged units in arrival order.
    pub untagged: Vec<ResponseUnit>,
    /// Completion status.
    pub status: Status,
    /// The tagged completion line without its terminator.
    pub tagged_line: String,
}

/// Reads one response unit, following any literals it announces.
///
/// # Errors
///
/// Transport errors, plus [`abrimail_transport::Error::Protocol`] for a
/// literal larger than the 100 MiB limit.
pub async fn read_unit<S>(stream: &mut LineStream<S>) -> Result<ResponseUnit>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut unit = ResponseUnit::default();

    loop {
        let line = stream.read_line().await?;
        let kind = classify(&line);
        unit.parts.push(Part::Line(line));

        match kind {
            LineKind::Plain => return Ok(unit),
            LineKind::Literal(len) => {
                if len > MAX_LITERAL_SIZE {
                    return Err(abrimail_transport::Error::Protocol(format!(
                        "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                    ))
                    .into());
                }
                trace!(len, "reading literal");
                let data = stream.read_exact(len).await?;
                unit.parts.push(Part::Literal(data));
            }
        }
    }
}

/// Reads units until the completion line for `tag`.
///
/// # Errors
///
/// Transport errors; a tagged line with no status word is a parse error.
pub async fn read_tagged<S>(stream: &mut LineStream<S>, tag: Tag) -> Result<TaggedResponse>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut untagged = Vec::new();

    loop {
        let unit = read_unit(stream).await?;

        if !tag.completes(unit.first_line()) {
            untagged.push(unit);
            continue;
        }

        let tagged_line = unit.first_line_text().into_owned();
        let word = tagged_line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| Error::Parse {
                position: tagged_line.len(),
                message: format!("missing status in tagged line: {tagged_line}"),
            })?;
        let status = Status::parse(word);

        return Ok(TaggedResponse {
            untagged,
            status,
            tagged_line,
        });
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
    use crate::tag::TagGenerator;
    use proptest::prelude::*;
    use tokio_test::io::Builder;

    fn first_tag() -> Tag {
        TagGenerator::new().next()
    }

    #[tokio::test]
    async fn test_read_simple_tagged() {
        let mock = Builder::new()
            .read(b"* 3 EXISTS\r\n")
            .read(b"A001 OK done\r\n")
            .build();
        let mut stream = LineStream::new(mock);

        let response = read_tagged(&mut stream, first_tag()).await.unwrap();
        assert_eq!(response.untagged.len(), 1);
        assert_eq!(response.untagged[0].first_line_text(), "* 3 EXISTS");
        assert!(response.status.is_ok());
        assert_eq!(response.tagged_line, "A001 OK done");
    }

    #[tokio::test]
    async fn test_failure_status() {
        let mock = Builder::new()
            .read(b"A001 NO [AUTHENTICATIONFAILED] nope\r\n")
            .build();
        let mut stream = LineStream::new(mock);

        let response = read_tagged(&mut stream, first_tag()).await.unwrap();
        assert_eq!(response.status, Status::No);
        assert_eq!(response.tagged_line, "A001 NO [AUTHENTICATIONFAILED] nope");
    }

    #[tokio::test]
    async fn test_other_tags_are_untagged_units() {
        let mock = Builder::new()
            .read(b"A0010 OK not ours\r\n")
            .read(b"A001 BAD ours\r\n")
            .build();
        let mut stream = LineStream::new(mock);

        let response = read_tagged(&mut stream, first_tag()).await.unwrap();
        assert_eq!(response.untagged.len(), 1);
        assert_eq!(response.status, Status::Bad);
    }

    #[tokio::test]
    async fn test_literal_with_embedded_line_breaks() {
        let literal = b"Subject: hi\r\n\r\nline one\r\nA001 OK fake\r\n";
        let mut wire = format!("* 1 FETCH (BODY[] {{{}}}\r\n", literal.len()).into_bytes();
        wire.extend_from_slice(literal);
        wire.extend_from_slice(b")\r\nA001 OK FETCH completed\r\n");

        let mock = Builder::new().read(&wire).build();
        let mut stream = LineStream::new(mock);

        let response = read_tagged(&mut stream, first_tag()).await.unwrap();
        assert_eq!(response.untagged.len(), 1);

        let unit = &response.untagged[0];
        assert_eq!(unit.parts().len(), 3);
        assert_eq!(unit.literal_after("BODY[]"), Some(&literal[..]));
        assert_eq!(response.tagged_line, "A001 OK FETCH completed");
    }

    #[tokio::test]
    async fn test_multiple_literals_in_one_unit() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[HEADER] {3}\r\nabc BODY[TEXT] {2}\r\nxy)\r\n")
            .read(b"A001 OK\r\n")
            .build();
        let mut stream = LineStream::new(mock);

        let response = read_tagged(&mut stream, first_tag()).await.unwrap();
        let unit = &response.untagged[0];
        let literals: Vec<_> = unit.literals().collect();
        assert_eq!(literals, vec![&b"abc"[..], &b"xy"[..]]);
        assert_eq!(unit.literal_after("BODY[TEXT]"), Some(&b"xy"[..]));
        assert_eq!(
            unit.to_bytes().as_ref(),
            b"* 1 FETCH (BODY[HEADER] {3}\r\nabc BODY[TEXT] {2}\r\nxy)\r\n"
        );
    }

    #[tokio::test]
    async fn test_brace_in_prose_is_not_a_literal() {
        let mock = Builder::new()
            .read(b"* OK see {5} later\r\n")
            .read(b"A001 OK\r\n")
            .build();
        let mut stream = LineStream::new(mock);

        let response = read_tagged(&mut stream, first_tag()).await.unwrap();
        assert_eq!(response.untagged[0].parts().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_literal_rejected() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {104857601}\r\n")
            .build();
        let mut stream = LineStream::new(mock);

        let err = read_tagged(&mut stream, first_tag()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(abrimail_transport::Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_peer_close_before_tag() {
        let mock = Builder::new().read(b"* 1 EXISTS\r\n").build();
        let mut stream = LineStream::new(mock);

        let err = read_tagged(&mut stream, first_tag()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(abrimail_transport::Error::EndOfStream)
        ));
    }

    proptest! {
        #[test]
        fn prop_literal_round_trips(payload in prop::collection::vec(any::<u8>(), 0..512)) {
            let mut wire = format!("* 1 FETCH (BODY[] {{{}}}\r\n", payload.len()).into_bytes();
            wire.extend_from_slice(&payload);
            wire.extend_from_slice(b")\r\nA001 OK done\r\n");

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let response = runtime.block_on(async {
                let mut stream = LineStream::new(Builder::new().read(&wire).build());
                read_tagged(&mut stream, first_tag()).await.unwrap()
            });

            prop_assert_eq!(response.untagged.len(), 1);
            prop_assert_eq!(response.untagged[0].literal_after("BODY[]"), Some(payload.as_slice()));
            prop_assert!(response.status.is_ok());
        }
    }
}
