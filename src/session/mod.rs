//! Interactive sessions with network devices

mod builder;
mod scripted;
mod spawn;

pub use builder::SessionBuilder;
pub use scripted::{DeviceScript, ScriptStats, ScriptedConnector, ScriptedTransport};
pub use spawn::{Method, SessionRequest};

use crate::buffer::StreamBuffer;
use crate::pattern::Pattern;
use crate::result::{MatchResult, TransportError};
use portable_pty::{Child, MasterPty};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

/// Deadline used when a wait's timeout does not fit the clock.
const LONGEST_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Capability every session offers to the login and command logic.
///
/// Screen scraping over a PTY is one way to implement it; anything that can
/// send a line and wait for a pattern in the reply can stand in, including
/// the scripted transports used in tests.
pub trait Transport: Send {
    /// Send `text` followed by the session's line terminator.
    fn send_line(&mut self, text: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait until one of `patterns` matches incoming output (first match wins).
    ///
    /// Only the calling task waits; the wait is bounded by `timeout`.
    fn expect_any(
        &mut self,
        patterns: &[&Pattern],
        timeout: Duration,
    ) -> impl Future<Output = Result<MatchResult, TransportError>> + Send;

    /// Wait until `pattern` matches incoming output.
    fn expect(
        &mut self,
        pattern: &Pattern,
        timeout: Duration,
    ) -> impl Future<Output = Result<MatchResult, TransportError>> + Send {
        async move {
            let patterns = [pattern];
            self.expect_any(&patterns, timeout).await
        }
    }

    /// Terminate the session and release its resources.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens transports. One call per device task.
pub trait Connector: Send + Sync + 'static {
    /// The transport produced.
    type Transport: Transport + 'static;

    /// Start a session. Failure is fatal to the calling device only.
    fn connect(
        &self,
        request: &SessionRequest,
    ) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

/// Opens [`PtySession`]s by spawning the system ssh/telnet client.
#[derive(Debug, Clone, Default)]
pub struct PtyConnector {
    builder: SessionBuilder,
}

impl PtyConnector {
    /// Create a connector that configures sessions with `builder`.
    pub fn new(builder: SessionBuilder) -> Self {
        Self { builder }
    }
}

impl Connector for PtyConnector {
    type Transport = PtySession;

    /// Opening the PTY and forking the client block, so both run on the
    /// blocking pool.
    async fn connect(&self, request: &SessionRequest) -> Result<PtySession, TransportError> {
        let builder = self.builder.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || builder.spawn(&request))
            .await
            .map_err(|e| TransportError::Spawn(e.to_string()))?
    }
}

/// A session with a process running on a pseudo-terminal.
///
/// A reader thread forwards everything the process prints into a channel;
/// waiting for a pattern is a timed receive on that channel.
///
/// # Examples
///
/// ```no_run
/// use ndback::{Pattern, PtySession, Transport};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = PtySession::builder().spawn_command("telnet", &["192.0.2.1", "23"])?;
///
/// session.expect(&Pattern::regex("ogin:")?, Duration::from_secs(10)).await?;
/// session.send_line("backup").await?;
/// session.close().await;
/// # Ok(())
/// # }
/// ```
pub struct PtySession {
    _master: Box<dyn MasterPty + Send>,
    child: Option<Box<dyn Child + Send>>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    output: mpsc::Receiver<Vec<u8>>,
    buffer: StreamBuffer,
    line_ending: String,
    write_timeout: Duration,
    echo: bool,
    eof_reached: bool,
    closed: bool,
}

impl PtySession {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Check if the process is still running.
    pub fn is_alive(&mut self) -> bool {
        match &mut self.child {
            Some(child) => spawn::is_alive(child),
            None => false,
        }
    }

    /// Send raw bytes, without a line terminator.
    ///
    /// Fails with [`TransportError::Timeout`] when the process stops taking
    /// input for longer than the session's write timeout.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let writer = self.writer.clone();
        let data = data.to_vec();

        let write = tokio::task::spawn_blocking(move || {
            let mut writer = writer.blocking_lock();
            writer.write_all(&data)?;
            writer.flush()
        });
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(joined) => joined.map_err(|e| TransportError::Io(std::io::Error::other(e)))??,
            Err(_) => {
                debug!(timeout = ?self.write_timeout, "write to session stalled");
                return Err(TransportError::Timeout {
                    duration: self.write_timeout,
                });
            }
        }

        Ok(())
    }

    fn echo_chunk(&self, chunk: &[u8]) {
        if self.echo {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(chunk);
            let _ = stdout.flush();
        }
    }
}

impl Transport for PtySession {
    async fn send_line(&mut self, text: &str) -> Result<(), TransportError> {
        let mut line = String::with_capacity(text.len() + self.line_ending.len());
        line.push_str(text);
        line.push_str(&self.line_ending);
        self.send(line.as_bytes()).await
    }

    async fn expect_any(
        &mut self,
        patterns: &[&Pattern],
        timeout: Duration,
    ) -> Result<MatchResult, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let now = tokio::time::Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + LONGEST_WAIT);

        loop {
            if let Some(result) = self.buffer.consume_match(patterns) {
                trace!(pattern_index = result.pattern_index, matched = %result.matched, "pattern matched");
                return Ok(result);
            }
            if self.eof_reached {
                return Err(TransportError::Eof);
            }

            match tokio::time::timeout_at(deadline, self.output.recv()).await {
                Ok(Some(chunk)) => {
                    self.echo_chunk(&chunk);
                    if !self.buffer.append(&chunk) {
                        return Err(TransportError::FullBuffer {
                            size: self.buffer.len(),
                        });
                    }
                }
                Ok(None) => self.eof_reached = true,
                Err(_) => return Err(TransportError::Timeout { duration: timeout }),
            }
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        let Some(mut child) = self.child.take() else {
            return;
        };
        if spawn::is_alive(&mut child) {
            if let Err(e) = child.kill() {
                debug!("failed to kill session process: {e}");
            }
        }
        match tokio::task::spawn_blocking(move || child.wait()).await {
            Ok(Ok(status)) => debug!(exit_code = status.exit_code(), "session process reaped"),
            Ok(Err(e)) => debug!("failed to reap session process: {e}"),
            Err(e) => debug!("reaper task failed: {e}"),
        }
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if spawn::is_alive(child) {
                let _ = child.kill();
            }
        }
    }
}
