//! IMAP command tags.
//!
//! Tags are used to match commands with their responses.

use std::fmt;

/// Prefix shared by every tag.
pub const TAG_PREFIX: char = 'A';

/// A command tag such as `A001`.
///
/// Tags order by their counter, so `A999 < A1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(u64);

impl Tag {
    /// Counter value behind this tag.
    #[must_use]
    pub const fn number(self) -> u64 {
        self.0
    }

    /// Returns true if `line` is this tag's completion line.
    #[must_use]
    pub fn completes(self, line: &[u8]) -> bool {
        let prefix = format!("{self} ");
        line.starts_with(prefix.as_bytes())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TAG_PREFIX}{:03}", self.0)
    }
}

/// Tag generator for one session.
///
/// Starts at `A001` and never reuses a value.
#[derive(Debug)]
pub struct TagGenerator {
    counter: u64,
}

impl TagGenerator {
    /// Creates a generator whose first tag is `A001`.
    #[must_use]
    pub const fn new() -> Self {
        Self { counter: 1 }
    }

    /// Allocates the next tag.
    pub const fn next(&mut self) -> Tag {
        let tag = Tag(self.counter);
        self.counter = self.counter.saturating_add(1);
        tag
    }

    /// Number of tags handed out so far.
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.counter - 1
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new()
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
    use proptest::prelude::*;

    #[test]
    fn test_tag_generation() {
        let mut generator = TagGenerator::new();
        assert_eq!(generator.next().to_string(), "A001");
        assert_eq!(generator.next().to_string(), "A002");
        assert_eq!(generator.next().to_string(), "A003");
        assert_eq!(generator.issued(), 3);
    }

    #[test]
    fn test_format_widens_past_999() {
        let mut generator = TagGenerator::new();
        for _ in 1..999 {
            let _ = generator.next();
        }
        let a999 = generator.next();
        let a1000 = generator.next();
        assert_eq!(a999.to_string(), "A999");
        assert_eq!(a1000.to_string(), "A1000");
        assert!(a1000 > a999);
    }

    #[test]
    fn test_completes() {
        let mut generator = TagGenerator::new();
        let tag = generator.next();
        assert!(tag.completes(b"A001 OK done\r\n"));
        assert!(!tag.completes(b"A0010 OK done\r\n"));
        assert!(!tag.completes(b"* OK A001 \r\n"));
        assert!(!tag.completes(b"A002 OK done\r\n"));
    }

    #[test]
    fn test_uniqueness() {
        let mut generator = TagGenerator::new();
        let mut seen = std::collections::HashSet::new();

        for _ in 0..10000 {
            let tag = generator.next().to_string();
            assert!(seen.insert(tag), "duplicate tag generated");
        }
    }

    proptest! {
        #[test]
        fn prop_tags_strictly_increase(count in 2usize..3000) {
            let mut generator = TagGenerator::new();
            let mut previous = generator.next();
            for _ in 1..count {
                let tag = generator.next();
                prop_assert!(tag > previous);
                prop_assert_ne!(tag.to_string(), previous.to_string());
                previous = tag;
            }
        }
    }
}
