//! Login state machine
//!
//! The three prompts of a device type are watched together. A user or
//! password challenge is answered and the machine keeps waiting; the command
//! prompt ends the login. Devices legitimately repeat challenges (banner
//! noise, a first password rejected by a RADIUS timeout), so each challenge
//! may come back `retries` times before the login is declared failed.

use crate::config::{Credentials, Prompts};
use crate::result::TransportError;
use crate::session::Transport;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a login did not reach the command prompt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    /// The user challenge came back more often than the retry budget allows.
    #[error("access denied, wrong username")]
    WrongUsername,

    /// The password challenge came back more often than the retry budget allows.
    #[error("access denied, wrong password")]
    WrongPassword,

    /// None of the prompts showed up in time.
    #[error("timeout waiting for login or command prompt")]
    Timeout,

    /// The session ended or failed during login.
    #[error("session lost during login: {0}")]
    Disconnected(String),
}

/// What the device asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Challenge {
    /// Login name prompt
    User,
    /// Password prompt
    Password,
    /// Command prompt; the device is ready
    Prompt,
}

impl Challenge {
    /// Order in which the prompts are handed to the transport.
    const WATCH_ORDER: [Challenge; 3] = [Challenge::User, Challenge::Password, Challenge::Prompt];

    fn from_index(index: usize) -> Option<Self> {
        Self::WATCH_ORDER.get(index).copied()
    }
}

/// Where the login stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    /// Waiting for the device to ask for something or show its prompt
    AwaitingChallenge,
    /// The command prompt was seen
    Authenticated,
    /// Terminal failure
    Failed(LoginFailure),
}

/// Drives a transport from connection to the first command prompt.
///
/// `retries` counts re-prompts: the first user challenge is answered and up
/// to `retries` more are answered after it; the next one fails the login
/// without sending anything. The password challenge has its own count.
///
/// With the default of 2 the fourth challenge fails. Older setups that gave
/// up on the third one get that behavior with `LoginRetries = 1`.
#[derive(Debug)]
pub struct LoginMachine<'a> {
    prompts: &'a Prompts,
    credentials: &'a Credentials,
    retries: u32,
    timeout: Duration,
    state: LoginState,
    user_challenges: u32,
    password_challenges: u32,
}

impl<'a> LoginMachine<'a> {
    /// Create a machine in [`LoginState::AwaitingChallenge`].
    pub fn new(
        prompts: &'a Prompts,
        credentials: &'a Credentials,
        retries: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            prompts,
            credentials,
            retries,
            timeout,
            state: LoginState::AwaitingChallenge,
            user_challenges: 0,
            password_challenges: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> &LoginState {
        &self.state
    }

    /// Apply one challenge and return the line to send in reply, if any.
    ///
    /// Challenges arriving after a terminal state are ignored.
    pub fn on_challenge(&mut self, challenge: Challenge) -> Option<&'a str> {
        if self.state != LoginState::AwaitingChallenge {
            return None;
        }
        let allowed = self.retries.saturating_add(1);

        match challenge {
            Challenge::Prompt => {
                self.state = LoginState::Authenticated;
                None
            }
            Challenge::User => {
                self.user_challenges += 1;
                if self.user_challenges > allowed {
                    self.state = LoginState::Failed(LoginFailure::WrongUsername);
                    return None;
                }
                Some(self.credentials.user.as_str())
            }
            Challenge::Password => {
                self.password_challenges += 1;
                if self.password_challenges > allowed {
                    self.state = LoginState::Failed(LoginFailure::WrongPassword);
                    return None;
                }
                Some(self.credentials.password.as_str())
            }
        }
    }

    /// Record a transport error while waiting or sending.
    pub fn on_error(&mut self, error: &TransportError) {
        if self.state != LoginState::AwaitingChallenge {
            return;
        }
        let failure = match error {
            TransportError::Timeout { .. } => LoginFailure::Timeout,
            other => LoginFailure::Disconnected(other.to_string()),
        };
        self.state = LoginState::Failed(failure);
    }

    /// Run the login to a terminal state.
    pub async fn run<T: Transport>(mut self, transport: &mut T) -> Result<(), LoginFailure> {
        let prompts = self.prompts;
        let watched = [&prompts.user, &prompts.password, &prompts.command];

        loop {
            match &self.state {
                LoginState::Authenticated => return Ok(()),
                LoginState::Failed(failure) => return Err(failure.clone()),
                LoginState::AwaitingChallenge => {}
            }

            let challenge = match transport.expect_any(&watched, self.timeout).await {
                Ok(result) => match Challenge::from_index(result.pattern_index) {
                    Some(challenge) => challenge,
                    None => continue,
                },
                Err(e) => {
                    self.on_error(&e);
                    continue;
                }
            };
            debug!(?challenge, "login challenge");

            if let Some(reply) = self.on_challenge(challenge) {
                if let Err(e) = transport.send_line(reply).await {
                    self.on_error(&e);
                }
            }
        }
    }
}
