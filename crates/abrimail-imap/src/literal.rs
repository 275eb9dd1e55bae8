//! Literal marker detection.
//!
//! A server line announces a literal when its content ends with `{n}`
//! immediately before the line terminator. The next `n` bytes on the wire
//! are raw data and must not be read as lines.

/// How the reader must treat what follows a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Ordinary protocol text.
    Plain,
    /// The line announces a literal of this many bytes.
    Literal(usize),
}

/// Classifies one line (terminator included or not).
///
/// Only a brace group of ASCII digits at the very end of the line counts.
/// Braces elsewhere, empty braces and non-digit content are plain text. A
/// count too large for `usize` is reported as `usize::MAX` so the reader
/// rejects it as oversized.
#[must_use]
pub fn classify(line: &[u8]) -> LineKind {
    let content = line
        .strip_suffix(b"\n")
        .map_or(line, |l| l.strip_suffix(b"\r").unwrap_or(l));

    let Some(inner) = content.strip_suffix(b"}") else {
        return LineKind::Plain;
    };
    let Some(open) = inner.iter().rposition(|&b| b == b'{') else {
        return LineKind::Plain;
    };

    let digits = &inner[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return LineKind::Plain;
    }

    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .map_or(LineKind::Literal(usize::MAX), LineKind::Literal)
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

    #[test]
    fn test_literal_at_end() {
        assert_eq!(
            classify(b"* 1 FETCH (BODY[] {57}\r\n"),
            LineKind::Literal(57)
        );
        assert_eq!(classify(b"* 1 FETCH (BODY[] {0}\n"), LineKind::Literal(0));
        assert_eq!(classify(b"{12}"), LineKind::Literal(12));
    }

    #[test]
    fn test_braces_in_prose_are_plain() {
        assert_eq!(classify(b"* OK see {5} for details\r\n"), LineKind::Plain);
        assert_eq!(classify(b"A001 OK done {5} \r\n"), LineKind::Plain);
        assert_eq!(classify(b"* 1 FETCH (BODY[] {}\r\n"), LineKind::Plain);
        assert_eq!(classify(b"* 1 FETCH (BODY[] {5+}\r\n"), LineKind::Plain);
        assert_eq!(classify(b"* 1 FETCH (BODY[] {x5}\r\n"), LineKind::Plain);
        assert_eq!(classify(b"no braces\r\n"), LineKind::Plain);
        assert_eq!(classify(b""), LineKind::Plain);
    }

    #[test]
    fn test_huge_count_is_oversized() {
        assert_eq!(
            classify(b"* 1 FETCH (BODY[] {99999999999999999999999}\r\n"),
            LineKind::Literal(usize::MAX)
        );
    }
}
