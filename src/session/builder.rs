//! Session builder for configuration

use crate::buffer::{StreamBuffer, DEFAULT_MAX_PENDING};
use crate::result::TransportError;
use crate::session::{PtySession, SessionRequest};
use portable_pty::{native_pty_system, CommandBuilder, PtyPair, PtySize};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

/// Default PTY rows
const DEFAULT_PTY_ROWS: u16 = 24;

/// Default PTY columns. Wide enough that devices don't wrap config lines.
const DEFAULT_PTY_COLS: u16 = 512;

/// Default bound on a single write to the process.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Chunks buffered between the reader thread and the session.
const OUTPUT_CHANNEL_DEPTH: usize = 64;

/// Builder for configuring and spawning sessions.
///
/// # Defaults
///
/// - Max pending output: 16 MiB
/// - ANSI stripping: enabled
/// - PTY size: 24 rows x 512 columns
/// - Line ending: `\n`
/// - Write timeout: 30 seconds
/// - Echo: disabled
///
/// # Examples
///
/// ```no_run
/// use ndback::{Method, PtySession, SessionRequest};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let request = SessionRequest {
///     method: Method::Ssh,
///     address: "192.0.2.1".to_string(),
///     port: "22".to_string(),
///     user: "backup".to_string(),
///     line_ending: "\r".to_string(),
///     timeout: Duration::from_secs(60),
///     echo: false,
/// };
/// let session = PtySession::builder()
///     .max_pending(1024 * 1024)
///     .pty_size(40, 200)
///     .spawn(&request)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    max_pending: usize,
    strip_ansi: bool,
    pty_size: PtySize,
    line_ending: String,
    write_timeout: Duration,
    echo: bool,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    pub fn new() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
            strip_ansi: true,
            pty_size: PtySize {
                rows: DEFAULT_PTY_ROWS,
                cols: DEFAULT_PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            },
            line_ending: "\n".to_string(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            echo: false,
        }
    }

    /// Set the cap on output pending a match.
    pub fn max_pending(mut self, size: usize) -> Self {
        self.max_pending = size;
        self
    }

    /// Enable or disable ANSI escape sequence stripping before matching.
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.strip_ansi = strip;
        self
    }

    /// Set PTY (terminal) size.
    pub fn pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.pty_size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self
    }

    /// Terminator appended by `send_line`.
    pub fn line_ending(mut self, ending: impl Into<String>) -> Self {
        self.line_ending = ending.into();
        self
    }

    /// Bound on each write to the process.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Copy everything the process prints to stdout.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Open a session to a device.
    ///
    /// The request's line ending, timeout and echo flag override the
    /// builder's.
    pub fn spawn(self, request: &SessionRequest) -> Result<PtySession, TransportError> {
        let (program, args) = request.command_line();
        self.line_ending(request.line_ending.clone())
            .write_timeout(request.timeout)
            .echo(request.echo)
            .spawn_command(program, &args)
    }

    /// Spawn an arbitrary program on a fresh PTY.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The program name is empty
    /// - The PTY cannot be created
    /// - The process cannot be spawned
    pub fn spawn_command<S: AsRef<str>>(
        self,
        program: &str,
        args: &[S],
    ) -> Result<PtySession, TransportError> {
        if program.trim().is_empty() {
            return Err(TransportError::Spawn("empty command".to_string()));
        }

        let PtyPair { master, slave } = native_pty_system()
            .openpty(self.pty_size)
            .map_err(|e| TransportError::Pty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(program);
        for arg in args {
            cmd.arg(arg.as_ref());
        }
        // Devices page output and colour prompts for anything but a dumb terminal
        cmd.env("TERM", "dumb");

        let child = slave
            .spawn_command(cmd)
            .map_err(|e| TransportError::Spawn(format!("{program}: {e}")))?;
        // Only the child keeps the slave side open, so its exit reads as EOF
        drop(slave);

        let reader = master
            .try_clone_reader()
            .map_err(|e| TransportError::Pty(e.to_string()))?;
        let writer = master
            .take_writer()
            .map_err(|e| TransportError::Pty(e.to_string()))?;

        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_DEPTH);
        std::thread::Builder::new()
            .name(format!("pty-reader-{program}"))
            .spawn(move || forward_output(reader, tx))
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        Ok(PtySession {
            _master: master,
            child: Some(child),
            writer: Arc::new(Mutex::new(writer)),
            output: rx,
            buffer: StreamBuffer::new(self.max_pending, self.strip_ansi),
            line_ending: self.line_ending,
            write_timeout: self.write_timeout,
            echo: self.echo,
            eof_reached: false,
            closed: false,
        })
    }
}

/// Reader thread body: pump PTY output into the channel until EOF, a read
/// error (EIO once the child is gone) or the session being dropped.
fn forward_output(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                trace!("PTY reader stopped: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_program_rejected() {
        let result = SessionBuilder::new().spawn_command::<&str>("  ", &[]);
        assert!(matches!(result, Err(TransportError::Spawn(_))));
    }

    #[test]
    fn test_builder_overrides() {
        let builder = SessionBuilder::new()
            .max_pending(42)
            .strip_ansi(false)
            .pty_size(10, 20)
            .line_ending("\r\n")
            .write_timeout(Duration::from_secs(5))
            .echo(true);

        assert_eq!(builder.max_pending, 42);
        assert!(!builder.strip_ansi);
        assert_eq!(builder.pty_size.rows, 10);
        assert_eq!(builder.pty_size.cols, 20);
        assert_eq!(builder.line_ending, "\r\n");
        assert_eq!(builder.write_timeout, Duration::from_secs(5));
        assert!(builder.echo);
    }
}
