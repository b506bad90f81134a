//! Result types for transport operations

mod error;

pub use error::{PatternError, TransportError};

/// Result of a successful wait on the session stream.
///
/// The text is split around the match: `before` is everything the device
/// emitted since the previous match, `matched` is the text the pattern
/// consumed. Both are removed from the session buffer.
///
/// # Examples
///
/// ```no_run
/// use ndback::{Pattern, PtySession, Transport};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let mut session = PtySession::builder().spawn_command("cat", &[] as &[&str])?;
/// session.send_line("show clock").await?;
/// let result = session.expect(&Pattern::regex("#$")?, Duration::from_secs(10)).await?;
///
/// // The echoed command, the answer and the prompt, in order
/// println!("{}", result.captured());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Index of the pattern that matched.
    ///
    /// For `expect_any` this is the position in the pattern slice; for
    /// `expect` it is always 0.
    pub pattern_index: usize,

    /// The text the pattern matched.
    pub matched: String,

    /// Text that appeared before the match.
    pub before: String,
}

impl MatchResult {
    /// Everything consumed by this match: the preceding text followed by the
    /// matched text.
    pub fn captured(&self) -> String {
        let mut text = String::with_capacity(self.before.len() + self.matched.len());
        text.push_str(&self.before);
        text.push_str(&self.matched);
        text
    }
}
