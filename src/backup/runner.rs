//! Sequential command execution over an authenticated session

use crate::pattern::Pattern;
use crate::result::TransportError;
use crate::session::Transport;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// A command that could not be completed.
#[derive(Error, Debug)]
#[error("command \"{command}\" failed: {source}")]
pub struct CommandFailure {
    /// The command being sent or awaited
    pub command: String,
    /// What went wrong
    #[source]
    pub source: TransportError,
}

/// Raw output of a command sequence.
#[derive(Debug, Default)]
pub struct CommandOutput {
    /// One block per completed command, in command order
    pub blocks: Vec<String>,
    /// Set when the sequence stopped early
    pub failure: Option<CommandFailure>,
}

impl CommandOutput {
    /// Whether every command completed.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Sends commands one at a time, waiting for the prompt after each.
///
/// The settle delay is a grace period for devices that echo slowly; it does
/// not extend the prompt timeout.
#[derive(Debug, Clone)]
pub struct CommandRunner<'a> {
    prompt: &'a Pattern,
    timeout: Duration,
    settle: Duration,
}

impl<'a> CommandRunner<'a> {
    /// Create a runner waiting for `prompt` at most `timeout` per command.
    pub fn new(prompt: &'a Pattern, timeout: Duration) -> Self {
        Self {
            prompt,
            timeout,
            settle: Duration::ZERO,
        }
    }

    /// Pause before each prompt wait.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Run `commands` in order.
    ///
    /// Each block is everything the device printed between the command being
    /// sent and the prompt that followed, prompt included. The first failure
    /// stops the sequence; blocks captured before it are kept.
    pub async fn run<T: Transport>(&self, transport: &mut T, commands: &[String]) -> CommandOutput {
        let mut output = CommandOutput::default();

        for command in commands {
            if let Err(source) = transport.send_line(command).await {
                output.failure = Some(CommandFailure {
                    command: command.clone(),
                    source,
                });
                break;
            }
            if !self.settle.is_zero() {
                tokio::time::sleep(self.settle).await;
            }
            match transport.expect(self.prompt, self.timeout).await {
                Ok(result) => {
                    debug!(command = %command, bytes = result.before.len(), "command completed");
                    output.blocks.push(result.captured());
                }
                Err(source) => {
                    output.failure = Some(CommandFailure {
                        command: command.clone(),
                        source,
                    });
                    break;
                }
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DeviceScript, ScriptedTransport};

    fn commands(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_blocks_in_command_order() {
        let mut transport = ScriptedTransport::new(
            DeviceScript::new()
                .reply("show version", "IOS 15.2\r\nsw1#")
                .reply("show inventory", "NAME: \"Chassis\"\r\nsw1#"),
        );
        let prompt = Pattern::regex("#$").unwrap();
        let runner = CommandRunner::new(&prompt, Duration::from_secs(1));

        let output = runner
            .run(&mut transport, &commands(&["show version", "show inventory"]))
            .await;

        assert!(output.is_complete());
        assert_eq!(
            output.blocks,
            vec![
                "show version\r\nIOS 15.2\r\nsw1#",
                "show inventory\r\nNAME: \"Chassis\"\r\nsw1#",
            ]
        );
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let mut transport =
            ScriptedTransport::new(DeviceScript::new().reply("show version", "IOS 15.2\r\nsw1#"));
        let prompt = Pattern::regex("#$").unwrap();
        let runner = CommandRunner::new(&prompt, Duration::from_secs(1));

        let output = runner
            .run(
                &mut transport,
                &commands(&["show version", "show hangs", "show never-sent"]),
            )
            .await;

        assert_eq!(output.blocks.len(), 1);
        let failure = output.failure.unwrap();
        assert_eq!(failure.command, "show hangs");
        assert!(matches!(failure.source, TransportError::Timeout { .. }));
        assert_eq!(transport.sent(), vec!["show version", "show hangs"]);
    }

    #[tokio::test]
    async fn test_send_failure_recorded() {
        let mut transport = ScriptedTransport::new(DeviceScript::new());
        transport.close().await;
        let prompt = Pattern::regex("#$").unwrap();

        let output = CommandRunner::new(&prompt, Duration::from_secs(1))
            .run(&mut transport, &commands(&["show version"]))
            .await;

        assert!(output.blocks.is_empty());
        assert!(matches!(
            output.failure,
            Some(CommandFailure {
                source: TransportError::Closed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_settle_delay_applied() {
        let mut transport =
            ScriptedTransport::new(DeviceScript::new().reply("show clock", "12:00\r\nsw1#"));
        let prompt = Pattern::regex("#$").unwrap();
        let runner = CommandRunner::new(&prompt, Duration::from_secs(1)).settle(Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        let output = runner.run(&mut transport, &commands(&["show clock"])).await;

        assert!(output.is_complete());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_no_commands() {
        let mut transport = ScriptedTransport::new(DeviceScript::new());
        let prompt = Pattern::regex("#$").unwrap();

        let output = CommandRunner::new(&prompt, Duration::from_secs(1))
            .run(&mut transport, &[])
            .await;

        assert!(output.is_complete());
        assert!(output.blocks.is_empty());
    }
}
