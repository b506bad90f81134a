//! Buffering of session output between matches

mod ansi;

pub use ansi::{strip_ansi, strip_ansi_str, AnsiStripper};

use crate::pattern::{self, Pattern};
use crate::result::MatchResult;
use bytes::BytesMut;

/// Default cap on pending output (in bytes).
///
/// Large enough for the running configuration of a chassis switch.
pub const DEFAULT_MAX_PENDING: usize = 16 * 1024 * 1024;

/// Holds output received from a session that no pattern has consumed yet.
///
/// Unlike a rolling window, nothing is discarded until a pattern matches:
/// a command's output must be captured whole. When the pending data grows
/// past `max_size` the caller gets an overflow signal instead.
#[derive(Debug)]
pub struct StreamBuffer {
    pending: BytesMut,
    max_size: usize,
    ansi: Option<AnsiStripper>,
}

impl StreamBuffer {
    /// Create a new buffer
    pub fn new(max_size: usize, strip_ansi: bool) -> Self {
        Self {
            pending: BytesMut::with_capacity(8192),
            max_size,
            ansi: strip_ansi.then(AnsiStripper::new),
        }
    }

    /// Append a chunk read from the session.
    ///
    /// Returns `false` if the pending data now exceeds the cap.
    pub fn append(&mut self, data: &[u8]) -> bool {
        if let Some(stripper) = &mut self.ansi {
            self.pending.extend_from_slice(&stripper.strip(data));
        } else {
            self.pending.extend_from_slice(data);
        }
        self.pending.len() <= self.max_size
    }

    /// Try the patterns against pending output and consume through the
    /// earliest match.
    pub fn consume_match(&mut self, patterns: &[&Pattern]) -> Option<MatchResult> {
        let (pattern_index, start, end) = pattern::find_first(patterns, &self.pending)?;

        let mut taken = self.pending.split_to(end);
        let matched = taken.split_off(start);

        Some(MatchResult {
            pattern_index,
            matched: String::from_utf8_lossy(&matched).into_owned(),
            before: String::from_utf8_lossy(&taken).into_owned(),
        })
    }

    /// Pending bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pending
    }

    /// Number of pending bytes.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
