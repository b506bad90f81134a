//! Turning captured terminal output into backup lines

use crate::buffer::strip_ansi_str;
use crate::config::DeviceProfile;
use crate::pattern::{LineFilter, Pattern, Verdict};
use tracing::warn;

/// Removes prompts, echoed commands and unwanted lines from captured blocks.
///
/// Lines are classified after escape sequences and carriage returns are
/// removed and surrounding whitespace is trimmed, which makes sanitizing
/// idempotent for an empty prefix.
///
/// # Examples
///
/// ```
/// use ndback::{LineFilter, Pattern, Sanitizer};
///
/// let prompt = Pattern::regex("#$").unwrap();
/// let echoed = LineFilter::new();
/// let unwanted = LineFilter::compile("cisco", &["^Building configuration"]);
/// let sanitizer = Sanitizer::new(&prompt, &echoed, &unwanted);
///
/// let blocks = vec!["Building configuration...\r\nhostname sw1\r\nsw1#".to_string()];
/// assert_eq!(sanitizer.sanitize(&blocks, ""), vec!["hostname sw1"]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer<'a> {
    prompt: &'a Pattern,
    echoed: &'a LineFilter,
    unwanted: &'a LineFilter,
}

impl<'a> Sanitizer<'a> {
    /// Create a sanitizer from its three drop rules.
    pub fn new(prompt: &'a Pattern, echoed: &'a LineFilter, unwanted: &'a LineFilter) -> Self {
        Self {
            prompt,
            echoed,
            unwanted,
        }
    }

    /// The sanitizer for a device type.
    pub fn for_profile(profile: &'a DeviceProfile) -> Self {
        Self::new(
            &profile.prompts.command,
            &profile.echoed_commands,
            &profile.unwanted,
        )
    }

    /// Classify one cleaned, trimmed line.
    pub fn classify(&self, line: &str) -> Verdict {
        if self.prompt.is_match(line) {
            return Verdict::Drop;
        }
        match self.echoed.classify(line) {
            Verdict::Keep => self.unwanted.classify(line),
            verdict => verdict,
        }
    }

    /// Split blocks into lines, drop the unwanted ones and prefix the rest.
    ///
    /// Order is preserved across and within blocks.
    pub fn sanitize(&self, blocks: &[String], prefix: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut dropped_by_broken = 0usize;

        for block in blocks {
            for raw in block.split('\n') {
                let line = clean_line(raw);
                match self.classify(line.trim()) {
                    Verdict::Keep => {
                        let mut kept = String::with_capacity(prefix.len() + line.len());
                        kept.push_str(prefix);
                        kept.push_str(&line);
                        out.push(kept.trim().to_string());
                    }
                    Verdict::Drop => {}
                    Verdict::DropBroken => dropped_by_broken += 1,
                }
            }
        }

        if dropped_by_broken > 0 {
            warn!(
                lines = dropped_by_broken,
                "lines dropped by unwanted patterns that do not compile"
            );
        }
        out
    }
}

/// Strip escape sequences and carriage returns.
fn clean_line(raw: &str) -> String {
    let text = strip_ansi_str(raw);
    if text.contains('\r') {
        text.replace('\r', "")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::FilterRule;
    use proptest::prelude::*;

    struct Rules {
        prompt: Pattern,
        echoed: LineFilter,
        unwanted: LineFilter,
    }

    impl Rules {
        fn new(unwanted: &[&str]) -> Self {
            Self {
                prompt: Pattern::regex(r"^sw1[>#]$").unwrap(),
                echoed: ["show version", "show running-config"]
                    .iter()
                    .map(|cmd| FilterRule::literal(cmd))
                    .collect(),
                unwanted: LineFilter::compile("test", unwanted),
            }
        }

        fn sanitizer(&self) -> Sanitizer<'_> {
            Sanitizer::new(&self.prompt, &self.echoed, &self.unwanted)
        }
    }

    #[test]
    fn test_inventory_block_prefixed() {
        let rules = Rules::new(&[]);
        let blocks = vec![
            "show version\r\nCisco IOS Software, Version 15.2\r\nuptime is 3 weeks\r\nsw1#".to_string(),
        ];

        assert_eq!(
            rules.sanitizer().sanitize(&blocks, "!"),
            vec!["!Cisco IOS Software, Version 15.2", "!uptime is 3 weeks"]
        );
    }

    #[test]
    fn test_config_block_unprefixed_and_trimmed() {
        let rules = Rules::new(&["^Building configuration", "^Current configuration"]);
        let blocks = vec![
            "show running-config\r\nBuilding configuration...\r\n\r\nCurrent configuration : 1234 bytes\r\nhostname sw1\r\ninterface Gi0/1\r\n description uplink\r\nend\r\nsw1#"
                .to_string(),
        ];

        assert_eq!(
            rules.sanitizer().sanitize(&blocks, ""),
            vec!["", "hostname sw1", "interface Gi0/1", "description uplink", "end"]
        );
    }

    #[test]
    fn test_order_across_blocks() {
        let rules = Rules::new(&[]);
        let blocks = vec!["a\nb\nsw1#".to_string(), "c\nsw1#".to_string(), "d".to_string()];
        assert_eq!(rules.sanitizer().sanitize(&blocks, ""), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_ansi_removed() {
        let rules = Rules::new(&[]);
        let blocks = vec!["\x1b[K\x1b[10Dinterface Gi0/2\r\nsw1#".to_string()];
        assert_eq!(rules.sanitizer().sanitize(&blocks, ""), vec!["interface Gi0/2"]);
    }

    #[test]
    fn test_echo_with_prompt_prefix_dropped() {
        let rules = Rules::new(&[]);
        let blocks = vec!["sw1#show version\r\nIOS\r\nsw1#".to_string()];
        assert_eq!(rules.sanitizer().sanitize(&blocks, "#"), vec!["#IOS"]);
    }

    #[test]
    fn test_broken_pattern_drops_all() {
        let rules = Rules::new(&["(oops"]);
        let blocks = vec!["hostname sw1\r\nend\r\nsw1#".to_string()];
        assert!(rules.sanitizer().sanitize(&blocks, "").is_empty());
    }

    #[test]
    fn test_empty_input() {
        let rules = Rules::new(&[]);
        assert!(rules.sanitizer().sanitize(&[], "!").is_empty());
    }

    proptest! {
        #[test]
        fn prop_unwanted_lines_never_survive(
            lines in proptest::collection::vec("[a-z ]{0,12}", 0..20),
            secret in "[a-z]{3,8}",
        ) {
            let pattern = format!("^secret {secret}$");
            let rules = Rules::new(&[pattern.as_str()]);
            let unwanted_line = format!("secret {secret}");

            let mut text = lines.join("\n");
            text.push('\n');
            text.push_str(&unwanted_line);
            text.push('\n');
            text.push_str(&lines.join("\n"));

            let out = rules.sanitizer().sanitize(&[text], "");
            prop_assert!(!out.contains(&unwanted_line));
        }

        #[test]
        fn prop_sanitize_is_idempotent(
            lines in proptest::collection::vec("[ a-z0-9#!\\r]{0,16}", 0..30),
        ) {
            let rules = Rules::new(&["^!", "^ntp"]);
            let sanitizer = rules.sanitizer();

            let once = sanitizer.sanitize(&[lines.join("\n")], "");
            let twice = sanitizer.sanitize(&once, "");
            prop_assert_eq!(once, twice);
        }
    }
}
