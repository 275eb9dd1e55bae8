//! Header/body splitting.

use std::collections::HashMap;
use std::fmt;

/// Lower-cased header names mapped to their trimmed values.
///
/// A repeated header keeps only its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: HashMap<String, String>,
}

impl Headers {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any earlier value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(name.as_ref().trim().to_lowercase(), value.into());
    }

    /// Gets a header value by case-insensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_lowercase())
    }

    /// Number of distinct headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if no headers were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterates over `(name, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sorted: Vec<_> = self.headers.iter().collect();
        sorted.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (name, value) in sorted {
            // "content-type" -> "Content-Type"
            let capitalized = name
                .split('-')
                .map(|part| {
                    let mut chars = part.chars();
                    chars.next().map_or_else(String::new, |first| {
                        first.to_uppercase().collect::<String>() + chars.as_str()
                    })
                })
                .collect::<Vec<_>>()
                .join("-");

            writeln!(f, "{capitalized}: {value}")?;
        }

        Ok(())
    }
}

/// Splits a raw RFC 822 message into its headers and body.
///
/// Lines are scanned in order. Until the first whitespace-only line, any
/// line with a colon after at least one character is split at that colon;
/// other lines are ignored. Everything after the blank line is the body,
/// kept verbatim except for trailing whitespace.
///
/// Folded (continuation) header lines are not unfolded.
#[must_use]
pub fn split_headers_and_body(raw: &str) -> (Headers, String) {
    let mut headers = Headers::new();
    let mut rest = raw;

    while !rest.is_empty() {
        let (line, remainder) = rest.split_once('\n').unwrap_or((rest, ""));
        rest = remainder;

        if line.trim().is_empty() {
            return (headers, rest.trim_end().to_string());
        }

        if let Some(colon) = line.find(':')
            && colon > 0
        {
            headers.insert(&line[..colon], line[colon + 1..].trim());
        }
    }

    (headers, String::new())
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
    use proptest::prelude::*;

    #[test]
    fn test_split_basic() {
        let raw = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "\r\n",
            "Hello,\r\n",
            "World!\r\n",
        );

        let (headers, body) = split_headers_and_body(raw);
        assert_eq!(headers.get("from"), Some("sender@example.com"));
        assert_eq!(headers.get("To"), Some("recipient@example.com"));
        assert_eq!(headers.get("subject"), Some("Test Message"));
        assert_eq!(body, "Hello,\r\nWorld!");
    }

    #[test]
    fn test_split_value_with_colon() {
        let (headers, _) = split_headers_and_body("Date: Mon, 1 Jan 2024 10:00:00 +0000\n\n");
        assert_eq!(headers.get("date"), Some("Mon, 1 Jan 2024 10:00:00 +0000"));
    }

    #[test]
    fn test_split_ignores_lines_without_name() {
        let (headers, body) = split_headers_and_body(":orphan\nno colon here\nX-A: 1\n\nbody");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-a"), Some("1"));
        assert_eq!(body, "body");
    }

    #[test]
    fn test_split_last_header_wins() {
        let (headers, _) = split_headers_and_body("Received: a\nreceived: b\n\n");
        assert_eq!(headers.get("received"), Some("b"));
    }

    #[test]
    fn test_split_folded_header_not_unfolded() {
        let raw = "Subject: first part\n  second part\nFrom: a@b.c\n\nbody";
        let (headers, body) = split_headers_and_body(raw);
        assert_eq!(headers.get("subject"), Some("first part"));
        assert_eq!(headers.get("from"), Some("a@b.c"));
        assert_eq!(body, "body");
    }

    #[test]
    fn test_split_body_keeps_leading_whitespace() {
        let (_, body) = split_headers_and_body("A: 1\n\n\n  indented\n\n");
        assert_eq!(body, "\n  indented");
    }

    #[test]
    fn test_split_headers_only() {
        let (headers, body) = split_headers_and_body("A: 1\nB: 2");
        assert_eq!(headers.len(), 2);
        assert!(body.is_empty());
    }

    #[test]
    fn test_split_empty() {
        let (headers, body) = split_headers_and_body("");
        assert!(headers.is_empty());
        assert!(body.is_empty());
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.insert("content-type", "text/plain");
        headers.insert("From", "a@b.c");

        assert_eq!(headers.to_string(), "Content-Type: text/plain\nFrom: a@b.c\n");
    }

    proptest! {
        #[test]
        fn prop_split_is_idempotent(
            pairs in prop::collection::vec(("[a-z][a-z-]{0,10}", "[ -~]{0,20}"), 1..6),
            body in "[ -~\n]{0,80}",
        ) {
            let mut raw = String::new();
            for (name, value) in &pairs {
                raw.push_str(&format!("{name}: {value}\n"));
            }
            raw.push('\n');
            raw.push_str(&body);

            let (headers, body) = split_headers_and_body(&raw);
            let rendered = headers.to_string();
            let rebuilt = format!("{}\n\n{body}", rendered.trim_end_matches('\n'));
            let (headers_again, body_again) = split_headers_and_body(&rebuilt);

            prop_assert_eq!(headers_again, headers);
            prop_assert_eq!(body_again, body);
        }
    }
}
