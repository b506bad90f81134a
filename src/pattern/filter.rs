//! Line classification against sets of patterns

use super::Pattern;
use tracing::warn;

/// A single filtering rule.
///
/// Rules that fail to compile are kept as [`FilterRule::Broken`] and match
/// every line: dropping output is recoverable by fixing the configuration,
/// leaking prompts or secrets into a backup is not.
#[derive(Debug, Clone)]
pub enum FilterRule {
    /// A compiled pattern.
    Compiled(Pattern),
    /// A pattern that did not compile.
    Broken {
        /// The pattern as written in the configuration
        source: String,
        /// Compiler error message
        reason: String,
    },
}

impl FilterRule {
    /// Compile a regex rule, falling back to [`FilterRule::Broken`].
    pub fn regex(source: &str) -> Self {
        match Pattern::regex(source) {
            Ok(pattern) => FilterRule::Compiled(pattern),
            Err(e) => FilterRule::Broken {
                source: source.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Compile a rule matching `text` literally.
    pub fn literal(text: &str) -> Self {
        match Pattern::literal(text) {
            Ok(pattern) => FilterRule::Compiled(pattern),
            Err(e) => FilterRule::Broken {
                source: text.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Whether the rule is the fail-safe variant.
    pub fn is_broken(&self) -> bool {
        matches!(self, FilterRule::Broken { .. })
    }
}

/// Outcome of classifying one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No rule matched.
    Keep,
    /// A compiled rule matched.
    Drop,
    /// Dropped because of a rule that did not compile.
    DropBroken,
}

/// An ordered set of rules; a line is unwanted if any rule matches it.
#[derive(Debug, Clone, Default)]
pub struct LineFilter {
    rules: Vec<FilterRule>,
}

impl LineFilter {
    /// Create an empty filter that keeps every line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile regex rules, logging a configuration warning for each one
    /// that fails. `owner` names the configuration entry in the warning.
    pub fn compile<S: AsRef<str>>(owner: &str, sources: &[S]) -> Self {
        let mut filter = Self::new();
        for source in sources {
            filter.push(FilterRule::regex(source.as_ref()));
        }
        filter.warn_broken(owner);
        filter
    }

    /// Add a rule.
    pub fn push(&mut self, rule: FilterRule) {
        self.rules.push(rule);
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the filter has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether any rule did not compile.
    pub fn has_broken(&self) -> bool {
        self.rules.iter().any(FilterRule::is_broken)
    }

    /// Classify a line.
    ///
    /// Compiled rules are checked first so a line matched by a valid rule is
    /// never attributed to a broken one.
    pub fn classify(&self, line: &str) -> Verdict {
        let compiled_hit = self.rules.iter().any(|rule| match rule {
            FilterRule::Compiled(pattern) => pattern.is_match(line),
            FilterRule::Broken { .. } => false,
        });
        if compiled_hit {
            Verdict::Drop
        } else if self.has_broken() {
            Verdict::DropBroken
        } else {
            Verdict::Keep
        }
    }

    fn warn_broken(&self, owner: &str) {
        for rule in &self.rules {
            if let FilterRule::Broken { source, reason } = rule {
                warn!(
                    owner,
                    pattern = %source,
                    "unwanted pattern does not compile ({reason}); every line will be dropped"
                );
            }
        }
    }
}

impl FromIterator<FilterRule> for LineFilter {
    fn from_iter<I: IntoIterator<Item = FilterRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_keeps() {
        let filter = LineFilter::new();
        assert_eq!(filter.classify("interface Gi0/1"), Verdict::Keep);
        assert!(filter.is_empty());
    }

    #[test]
    fn test_compiled_rule_drops() {
        let filter = LineFilter::compile("cisco", &["^Building configuration", "^Current configuration"]);
        assert_eq!(filter.classify("Building configuration..."), Verdict::Drop);
        assert_eq!(filter.classify("hostname sw1"), Verdict::Keep);
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_broken_rule_drops_everything() {
        let filter = LineFilter::compile("cisco", &["(unclosed"]);
        assert!(filter.has_broken());
        assert_eq!(filter.classify("hostname sw1"), Verdict::DropBroken);
        assert_eq!(filter.classify(""), Verdict::DropBroken);
    }

    #[test]
    fn test_compiled_hit_wins_over_broken() {
        let filter = LineFilter::compile("cisco", &["[", "^ntp clock-period"]);
        assert_eq!(filter.classify("ntp clock-period 1234"), Verdict::Drop);
        assert_eq!(filter.classify("ntp server 192.0.2.1"), Verdict::DropBroken);
    }

    #[test]
    fn test_literal_rules() {
        let filter: LineFilter = ["show version", "show inventory | begin NAME"]
            .iter()
            .map(|cmd| FilterRule::literal(cmd))
            .collect();

        assert_eq!(filter.classify("sw1#show version"), Verdict::Drop);
        assert_eq!(filter.classify("show inventory | begin NAME"), Verdict::Drop);
        assert_eq!(filter.classify("Cisco IOS Software, Version 15.2"), Verdict::Keep);
    }

    #[test]
    fn test_empty_literal_is_broken() {
        let rule = FilterRule::literal("");
        assert!(rule.is_broken());
    }
}
