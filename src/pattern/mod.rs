//! Pattern matching for prompts and output filtering

mod filter;

pub use filter::{FilterRule, LineFilter, Verdict};

use crate::result::PatternError;
use regex::bytes::Regex;

/// A compiled regular expression used against the session stream and
/// against individual output lines.
///
/// Patterns operate on bytes so a match can be attempted on pending output
/// that ends in the middle of a UTF-8 sequence. Compile once, share freely:
/// a `Pattern` is cheap to clone and `Send + Sync`.
///
/// # Examples
///
/// ```
/// use ndback::Pattern;
///
/// // Prompt of a Cisco-like device in enable mode
/// let prompt = Pattern::regex(r"[\w.-]+#\s*$").unwrap();
/// assert!(prompt.is_match("core-sw1#"));
///
/// // Literal text, metacharacters are escaped
/// let echo = Pattern::literal("show run | include hostname").unwrap();
/// assert!(echo.is_match("core-sw1#show run | include hostname"));
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Compile a regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::EmptyPattern`] for an empty string and
    /// [`PatternError::InvalidRegex`] for invalid syntax.
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::EmptyPattern);
        }
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Compile a pattern that matches `text` literally.
    pub fn literal(text: &str) -> Result<Self, PatternError> {
        if text.is_empty() {
            return Err(PatternError::EmptyPattern);
        }
        Self::regex(&regex::escape(text))
    }

    /// The source of the expression.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Find the first match in `buffer`, returning its byte range.
    pub fn find(&self, buffer: &[u8]) -> Option<(usize, usize)> {
        self.regex.find(buffer).map(|m| (m.start(), m.end()))
    }

    /// Check whether a line contains a match.
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line.as_bytes())
    }
}

/// Find the earliest match of any pattern in `buffer`.
///
/// Returns `(pattern_index, start, end)`. When two patterns match at the same
/// position the one listed first wins.
pub fn find_first(patterns: &[&Pattern], buffer: &[u8]) -> Option<(usize, usize, usize)> {
    patterns
        .iter()
        .enumerate()
        .filter_map(|(idx, pattern)| pattern.find(buffer).map(|(start, end)| (idx, start, end)))
        .min_by_key(|&(idx, start, _)| (start, idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_find() {
        let pattern = Pattern::regex(r"\d+").unwrap();
        assert_eq!(pattern.find(b"uptime 123 days"), Some((7, 10)));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(matches!(
            Pattern::regex(""),
            Err(PatternError::EmptyPattern)
        ));
        assert!(matches!(
            Pattern::literal(""),
            Err(PatternError::EmptyPattern)
        ));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        assert!(matches!(
            Pattern::regex("(unclosed"),
            Err(PatternError::InvalidRegex(_))
        ));
    }

    #[test]
    fn test_dollar_anchors_end_of_pending_output() {
        let prompt = Pattern::regex("#$").unwrap();

        // `banner motd #` inside a config dump is not a prompt
        assert_eq!(prompt.find(b"banner motd #\nhostname sw1\n"), None);
        assert_eq!(prompt.find(b"banner\nrouter#"), Some((13, 14)));
    }

    #[test]
    fn test_literal_escapes_metacharacters() {
        let pattern = Pattern::literal("display current-configuration | no-more").unwrap();
        assert!(pattern.is_match("<hw>display current-configuration | no-more"));
        assert!(!pattern.is_match("display current-configuration "));
    }

    #[test]
    fn test_find_first_prefers_earliest_position() {
        let user = Pattern::regex("ogin:").unwrap();
        let password = Pattern::regex("assword:").unwrap();
        let buffer = b"Password: (last login: never)";

        let found = find_first(&[&user, &password], buffer).unwrap();
        assert_eq!(found.0, 1);
        assert_eq!(found.1, 1);
    }

    #[test]
    fn test_find_first_tie_goes_to_first_listed() {
        let a = Pattern::regex("#").unwrap();
        let b = Pattern::regex("#$").unwrap();

        let found = find_first(&[&b, &a], b"sw#").unwrap();
        assert_eq!(found.0, 0);
    }

    #[test]
    fn test_find_first_none() {
        let a = Pattern::regex("ogin:").unwrap();
        assert_eq!(find_first(&[&a], b"nothing here"), None);
    }

    #[test]
    fn test_utf8_line_match() {
        let pattern = Pattern::regex("описание").unwrap();
        assert!(pattern.is_match(" описание uplink"));
    }
}
