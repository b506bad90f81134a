//! ANSI escape sequence stripping

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    Escape,
    /// `ESC [` ... final byte
    Csi,
    /// `ESC ]` ... BEL or `ESC \`
    Osc,
    OscEscape,
    /// `ESC (` / `ESC )` followed by one designator byte
    Charset,
}

/// Incremental ANSI escape stripper.
///
/// Keeps its state between calls, so a sequence split across two reads is
/// still removed whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnsiStripper {
    state: State,
}

impl Default for AnsiStripper {
    fn default() -> Self {
        Self { state: State::Text }
    }
}

impl AnsiStripper {
    /// Create a stripper positioned outside any escape sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the text bytes of `data` to `out`.
    pub fn strip_into(&mut self, data: &[u8], out: &mut Vec<u8>) {
        let mut state = self.state;
        for &byte in data {
            state = match (state, byte) {
                (State::Text, 0x1b) => State::Escape,
                (State::Text, _) => {
                    out.push(byte);
                    State::Text
                }
                (State::Escape, b'[') => State::Csi,
                (State::Escape, b']') => State::Osc,
                (State::Escape, b'(' | b')') => State::Charset,
                (State::Escape, _) => State::Text,
                (State::Csi, 0x40..=0x7e) => State::Text,
                (State::Csi, _) => State::Csi,
                (State::Osc, 0x07) => State::Text,
                (State::Osc, 0x1b) => State::OscEscape,
                (State::Osc, _) => State::Osc,
                (State::OscEscape, b'\\') => State::Text,
                (State::OscEscape, _) => State::Osc,
                (State::Charset, _) => State::Text,
            };
        }
        self.state = state;
    }

    /// Text bytes of `data`.
    pub fn strip(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        self.strip_into(data, &mut out);
        out
    }
}

/// Remove ANSI escape sequences (colors, cursor movement, titles, charset
/// selection) from terminal output.
///
/// Network devices emit these around pagers and in some banners. A sequence
/// that is cut off at the end of `data` is dropped.
pub fn strip_ansi(data: &[u8]) -> Vec<u8> {
    AnsiStripper::new().strip(data)
}

/// [`strip_ansi`] for text that is already decoded.
pub fn strip_ansi_str(text: &str) -> String {
    if !text.contains('\x1b') {
        return text.to_string();
    }
    String::from_utf8_lossy(&strip_ansi(text.as_bytes())).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_csi() {
        let output = strip_ansi(b"Hello \x1b[31mred\x1b[0m world");
        assert_eq!(output, b"Hello red world");
    }

    #[test]
    fn test_strip_osc_bel() {
        let output = strip_ansi(b"Hello \x1b]0;Title\x07 world");
        assert_eq!(output, b"Hello  world");
    }

    #[test]
    fn test_strip_osc_st() {
        let output = strip_ansi(b"a\x1b]2;sw1\x1b\\b");
        assert_eq!(output, b"ab");
    }

    #[test]
    fn test_strip_charset() {
        let output = strip_ansi(b"\x1b(Bhostname sw1");
        assert_eq!(output, b"hostname sw1");
    }

    #[test]
    fn test_pager_erase_sequence() {
        // What a Cisco pager leaves behind after " --More-- " is erased
        let output = strip_ansi(b"\x1b[K\x1b[10Dinterface Gi0/2");
        assert_eq!(output, b"interface Gi0/2");
    }

    #[test]
    fn test_no_ansi() {
        assert_eq!(strip_ansi(b"Hello world"), b"Hello world");
        assert_eq!(strip_ansi_str("Hello world"), "Hello world");
    }

    #[test]
    fn test_truncated_sequence_dropped() {
        assert_eq!(strip_ansi(b"text\x1b[3"), b"text");
    }

    #[test]
    fn test_stripper_keeps_state_between_chunks() {
        let mut stripper = AnsiStripper::new();
        assert_eq!(stripper.strip(b"end\x1b[1"), b"end");
        assert_eq!(stripper.strip(b"0Dsw1#"), b"sw1#");

        assert_eq!(stripper.strip(b"a\x1b]0;ti"), b"a");
        assert_eq!(stripper.strip(b"tle\x1b"), b"");
        assert_eq!(stripper.strip(b"\\b"), b"b");
    }

    #[test]
    fn test_str_variant_keeps_utf8() {
        assert_eq!(strip_ansi_str("\x1b[1mпорт\x1b[0m 1"), "порт 1");
    }
}
