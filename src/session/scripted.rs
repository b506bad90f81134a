//! In-memory sessions replaying canned device behavior
//!
//! A [`DeviceScript`] describes what a device prints on connect and in reply
//! to each line it receives. [`ScriptedConnector`] hands out
//! [`ScriptedTransport`]s built from scripts and keeps [`ScriptStats`] about
//! every session it opened, so a whole backup run can be exercised without
//! spawning a process.

use super::{Connector, SessionRequest, Transport};
use crate::buffer::{StreamBuffer, DEFAULT_MAX_PENDING};
use crate::pattern::Pattern;
use crate::result::{MatchResult, TransportError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned behavior of one device.
///
/// # Examples
///
/// ```
/// use ndback::DeviceScript;
///
/// let script = DeviceScript::new()
///     .greeting("login: ")
///     .reply("backup", "Password: ")
///     .reply("secret", "\r\nsw1#")
///     .reply("show version", "IOS 15.2\r\nsw1#");
/// ```
#[derive(Debug, Clone)]
pub struct DeviceScript {
    greeting: String,
    replies: HashMap<String, String>,
    hang_up_after: Option<String>,
    echo: bool,
    latency: Duration,
}

impl Default for DeviceScript {
    fn default() -> Self {
        Self {
            greeting: String::new(),
            replies: HashMap::new(),
            hang_up_after: None,
            echo: true,
            latency: Duration::ZERO,
        }
    }
}

impl DeviceScript {
    /// An empty script: silent, echoing every line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Output printed as soon as the session opens.
    pub fn greeting(mut self, text: impl Into<String>) -> Self {
        self.greeting = text.into();
        self
    }

    /// Output printed every time `line` is received.
    pub fn reply(mut self, line: impl Into<String>, output: impl Into<String>) -> Self {
        self.replies.insert(line.into(), output.into());
        self
    }

    /// Close the stream after replying to `line`.
    pub fn hang_up_after(mut self, line: impl Into<String>) -> Self {
        self.hang_up_after = Some(line.into());
        self
    }

    /// Whether received lines are echoed back, like a terminal does.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Delay before every wait completes.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Counters shared by every session a [`ScriptedConnector`] opened.
#[derive(Debug, Default)]
pub struct ScriptStats {
    connects: AtomicUsize,
    closes: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    requests: Mutex<Vec<SessionRequest>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl ScriptStats {
    /// Sessions opened.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Sessions closed through [`Transport::close`].
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Sessions currently open.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of sessions open at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Every connect request, including refused ones.
    pub fn requests(&self) -> Vec<SessionRequest> {
        lock(&self.requests).clone()
    }

    /// Lines sent to the device at `address`, in order.
    pub fn sent_to(&self, address: &str) -> Vec<String> {
        lock(&self.sent)
            .iter()
            .filter(|(to, _)| to == address)
            .map(|(_, line)| line.clone())
            .collect()
    }

    fn opened(&self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn released(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// A panic while holding the lock leaves plain data behind; keep using it
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Opens [`ScriptedTransport`]s, picking the script by device address.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    scripts: HashMap<String, DeviceScript>,
    fallback: Option<DeviceScript>,
    stats: Arc<ScriptStats>,
}

impl ScriptedConnector {
    /// A connector with no scripts; every connect fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `script` for the device at `address`.
    pub fn script(mut self, address: impl Into<String>, script: DeviceScript) -> Self {
        self.scripts.insert(address.into(), script);
        self
    }

    /// Use `script` for addresses without their own script.
    pub fn fallback(mut self, script: DeviceScript) -> Self {
        self.fallback = Some(script);
        self
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<ScriptStats> {
        Arc::clone(&self.stats)
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(
        &self,
        request: &SessionRequest,
    ) -> Result<ScriptedTransport, TransportError> {
        lock(&self.stats.requests).push(request.clone());

        let script = self
            .scripts
            .get(&request.address)
            .or(self.fallback.as_ref())
            .ok_or_else(|| TransportError::Spawn(format!("no route to {}", request.address)))?;

        Ok(ScriptedTransport::open(
            script.clone(),
            &request.address,
            Arc::clone(&self.stats),
        ))
    }
}

/// A session with a [`DeviceScript`].
///
/// All output is available immediately, so a wait that finds no match
/// fails at once: with [`TransportError::Eof`] after a hang-up, with
/// [`TransportError::Timeout`] otherwise.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: DeviceScript,
    address: String,
    buffer: StreamBuffer,
    hung_up: bool,
    closed: bool,
    stats: Arc<ScriptStats>,
}

impl ScriptedTransport {
    /// Open a standalone session.
    pub fn new(script: DeviceScript) -> Self {
        Self::open(script, "scripted", Arc::default())
    }

    fn open(script: DeviceScript, address: &str, stats: Arc<ScriptStats>) -> Self {
        stats.opened();
        let mut buffer = StreamBuffer::new(DEFAULT_MAX_PENDING, true);
        buffer.append(script.greeting.as_bytes());
        Self {
            script,
            address: address.to_string(),
            buffer,
            hung_up: false,
            closed: false,
            stats,
        }
    }

    /// Output received but not consumed by a match yet.
    pub fn pending(&self) -> String {
        String::from_utf8_lossy(self.buffer.as_bytes()).into_owned()
    }

    /// Whether [`Transport::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Lines this session sent.
    pub fn sent(&self) -> Vec<String> {
        self.stats.sent_to(&self.address)
    }
}

impl Transport for ScriptedTransport {
    async fn send_line(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.hung_up {
            return Err(TransportError::Io(std::io::ErrorKind::BrokenPipe.into()));
        }
        lock(&self.stats.sent).push((self.address.clone(), text.to_string()));

        if self.script.echo {
            self.buffer.append(text.as_bytes());
            self.buffer.append(b"\r\n");
        }
        if let Some(output) = self.script.replies.get(text) {
            if !self.buffer.append(output.as_bytes()) {
                return Err(TransportError::FullBuffer {
                    size: self.buffer.len(),
                });
            }
        }
        if self.script.hang_up_after.as_deref() == Some(text) {
            self.hung_up = true;
        }
        Ok(())
    }

    async fn expect_any(
        &mut self,
        patterns: &[&Pattern],
        timeout: Duration,
    ) -> Result<MatchResult, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if !self.script.latency.is_zero() {
            tokio::time::sleep(self.script.latency).await;
        }
        match self.buffer.consume_match(patterns) {
            Some(result) => Ok(result),
            None if self.hung_up => Err(TransportError::Eof),
            None => Err(TransportError::Timeout { duration: timeout }),
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        self.stats.released();
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        if !self.closed {
            self.stats.released();
        }
    }
}
