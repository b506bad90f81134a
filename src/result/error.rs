//! Error types for session transports and patterns

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to a device over an interactive session.
///
/// Every variant is fatal to the device task that owns the session and to no
/// one else; the scheduler only ever sees them as log lines.
///
/// # Examples
///
/// ```no_run
/// use ndback::{Pattern, PtySession, Transport, TransportError};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = PtySession::builder().spawn_command("telnet", &["192.0.2.1", "23"])?;
/// let prompt = Pattern::regex("#$")?;
///
/// match session.expect(&prompt, Duration::from_secs(5)).await {
///     Ok(result) => println!("Matched: {}", result.matched),
///     Err(TransportError::Timeout { duration }) => {
///         eprintln!("No prompt after {:?}", duration);
///     }
///     Err(TransportError::Eof) => eprintln!("Device hung up"),
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum TransportError {
    /// No pattern matched within the allowed time.
    #[error("timeout waiting for pattern (after {duration:?})")]
    Timeout {
        /// Duration that was waited before giving up
        duration: Duration,
    },

    /// The remote side closed the stream before a pattern matched.
    #[error("EOF reached before pattern matched")]
    Eof,

    /// Pending output grew past the buffer cap without a match.
    ///
    /// Usually a prompt pattern that never matches the device's real prompt.
    #[error("buffer full ({size} bytes) before pattern matched")]
    FullBuffer {
        /// Size of the pending output when the cap was hit
        size: usize,
    },

    /// Underlying read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Pseudo-terminal allocation or manipulation failed.
    #[error("PTY error: {0}")]
    Pty(String),

    /// The shell command could not be started.
    #[error("failed to spawn process: {0}")]
    Spawn(String),

    /// The session was already closed.
    #[error("session is closed")]
    Closed,
}

/// Errors related to pattern creation.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Invalid regex syntax.
    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Empty pattern; it would match everywhere.
    #[error("pattern cannot be empty")]
    EmptyPattern,
}
