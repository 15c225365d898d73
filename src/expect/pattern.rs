//! Matching rules over raw output bytes
//!
//! A pattern is either an exact literal or a regular expression. Regexes
//! are compiled over bytes with unicode mode off and octal escapes on, so
//! `\351` matches the single raw byte 0xE9. Process output may carry
//! Latin-1 or other non-UTF-8 encodings and must still be matchable.

use std::fmt;
use std::time::Duration;

use regex::bytes::RegexBuilder;

use crate::common::{Error, Result};

/// A matching rule plus an optional per-pattern timeout
///
/// Immutable once constructed. A pattern match consumes the buffer up
/// through the end of the match; subsequent expects search only the
/// remainder.
#[derive(Debug, Clone)]
pub struct Pattern {
    kind: PatternKind,
    source: String,
    timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
enum PatternKind {
    Literal(Vec<u8>),
    Regex(regex::bytes::Regex),
}

/// The outcome of a successful match
#[derive(Debug, Clone)]
pub struct MatchOutput {
    /// Bytes of the entire matched region
    pub bytes: Vec<u8>,
    /// Capture groups 1.., for regex patterns with groups
    pub captures: Vec<Option<Vec<u8>>>,
}

impl MatchOutput {
    /// Matched region as a lossy string, for display and assertions
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Capture group `i` (1-based) as a lossy string
    pub fn capture(&self, i: usize) -> Option<String> {
        self.captures
            .get(i.checked_sub(1)?)?
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

/// A match found within a haystack; `end` is the offset one past the match
pub(crate) struct Found {
    pub end: usize,
    pub output: MatchOutput,
}

impl Pattern {
    /// An exact byte-for-byte literal
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            source: String::from_utf8_lossy(&bytes).into_owned(),
            kind: PatternKind::Literal(bytes),
            timeout: None,
        }
    }

    /// A regular expression over raw bytes
    ///
    /// A pattern with no metacharacters behaves exactly like a literal.
    pub fn regex(source: &str) -> Result<Self> {
        let regex = RegexBuilder::new(source)
            .unicode(false)
            .octal(true)
            .build()
            .map_err(|e| Error::Pattern {
                pattern: source.to_string(),
                source: e,
            })?;
        Ok(Self {
            kind: PatternKind::Regex(regex),
            source: source.to_string(),
            timeout: None,
        })
    }

    /// Attach a per-pattern timeout, overriding the caller's default
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The per-pattern timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The pattern text as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Find the first match within `haystack`
    ///
    /// Matching is constrained to the bytes actually present: a regex can
    /// only match a region that is entirely buffered, never speculatively
    /// across bytes that have not arrived yet.
    pub(crate) fn find(&self, haystack: &[u8]) -> Option<Found> {
        match &self.kind {
            PatternKind::Literal(needle) => {
                let start = find_subsequence(haystack, needle)?;
                let end = start + needle.len();
                Some(Found {
                    end,
                    output: MatchOutput {
                        bytes: haystack[start..end].to_vec(),
                        captures: Vec::new(),
                    },
                })
            }
            PatternKind::Regex(regex) => {
                let caps = regex.captures(haystack)?;
                let whole = caps.get(0)?;
                let captures = (1..caps.len())
                    .map(|i| caps.get(i).map(|m| m.as_bytes().to_vec()))
                    .collect();
                Some(Found {
                    end: whole.end(),
                    output: MatchOutput {
                        bytes: whole.as_bytes().to_vec(),
                        captures,
                    },
                })
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_find() {
        let p = Pattern::literal(b"ready".as_slice());
        let found = p.find(b"server is ready now").unwrap();
        assert_eq!(found.output.bytes, b"ready");
        assert_eq!(found.end, 15);
        assert!(p.find(b"rea").is_none());
    }

    #[test]
    fn test_regex_without_metacharacters_is_a_literal_match() {
        let p = Pattern::regex("ready").unwrap();
        let found = p.find(b"server is ready").unwrap();
        assert_eq!(found.output.text(), "ready");
    }

    #[test]
    fn test_regex_octal_escape_matches_raw_byte() {
        // \351 is Latin-1 'é'; \303\251 is the same character in UTF-8
        let p = Pattern::regex(r#"journ\351e"#).unwrap();
        assert!(p.find(b"Bonne journ\xE9e").is_some());
        assert!(p.find(b"Bonne journ\xC3\xA9e").is_none());

        let p = Pattern::regex(r#"journ\303\251e"#).unwrap();
        assert!(p.find(b"Bonne journ\xC3\xA9e").is_some());
        assert!(p.find(b"Bonne journ\xE9e").is_none());
    }

    #[test]
    fn test_regex_capture_groups() {
        let p = Pattern::regex(r"listening on port (\d+)").unwrap();
        let found = p.find(b"info: listening on port 45678\n").unwrap();
        assert_eq!(found.output.capture(1).unwrap(), "45678");
    }

    #[test]
    fn test_invalid_regex_is_a_pattern_error() {
        let err = Pattern::regex("(unclosed").unwrap_err();
        assert!(matches!(err, Error::Pattern { .. }));
    }

    #[test]
    fn test_per_pattern_timeout() {
        let p = Pattern::literal(b"x".as_slice()).with_timeout(Duration::from_secs(3));
        assert_eq!(p.timeout(), Some(Duration::from_secs(3)));
    }
}
