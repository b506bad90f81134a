//! Device type profiles, compiled once at load

use super::Number;
use crate::pattern::{FilterRule, LineFilter, Pattern};
use crate::session::Method;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Seconds to wait for any single prompt when `Timeout` is unset.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Longest accepted `Timeout`: one day.
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Re-prompts tolerated per login challenge when `LoginRetries` is unset.
pub const DEFAULT_LOGIN_RETRIES: u32 = 2;

/// Grace period before awaiting a prompt when `SettleMillis` is unset.
pub const DEFAULT_SETTLE_MILLIS: u64 = 1000;

const DEFAULT_USER_PROMPT: &str = "ogin:";
const DEFAULT_PASSWORD_PROMPT: &str = "assword:";

/// A device type as written in the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeviceTypeConfig {
    /// `ssh` or `telnet`
    pub method: Option<String>,
    /// TCP port
    pub port: Option<Number>,
    /// Seconds to wait for each prompt
    pub timeout: Option<Number>,
    /// Echo the raw stream of these devices
    pub debug: bool,
    /// Login name challenge
    pub user_prompt: Option<String>,
    /// Password challenge
    pub pwd_prompt: Option<String>,
    /// Command prompt
    pub prompt: Option<String>,
    /// Comment marker prefixed to inventory lines
    pub comment: String,
    /// Commands whose output is kept as comments
    pub cmd_inventory: Vec<String>,
    /// Commands whose output is the configuration
    pub cmd_config: Vec<String>,
    /// Lines to drop from the backup
    pub unwanted: Vec<String>,
    /// Re-prompts tolerated per login challenge
    pub login_retries: Option<u32>,
    /// Grace period before awaiting a command prompt
    pub settle_millis: Option<u64>,
    /// Terminator appended to every line sent
    pub line_ending: Option<String>,
}

/// Why a device type cannot be used.
///
/// Devices of a defective type are skipped before any connection attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileDefect {
    /// No device type with that key
    #[error("device type is not configured")]
    UnknownType,

    /// Method missing or empty
    #[error("device type has no connection method")]
    MissingMethod,

    /// Method is neither ssh nor telnet
    #[error("unknown connection method \"{0}\"")]
    UnknownMethod(String),

    /// Port missing or empty
    #[error("device type has no port")]
    MissingPort,

    /// Timeout is not a whole number of seconds between 1 and
    /// [`MAX_TIMEOUT_SECS`]
    #[error("invalid timeout \"{0}\"")]
    InvalidTimeout(String),

    /// Command prompt missing or empty
    #[error("device type has no command prompt")]
    MissingPrompt,

    /// A login or command prompt does not compile
    #[error("{field} does not compile: {reason}")]
    InvalidPrompt {
        /// Configuration key of the prompt
        field: &'static str,
        /// Compiler error message
        reason: String,
    },
}

/// Prompts watched during login and between commands.
#[derive(Debug, Clone)]
pub struct Prompts {
    /// Login name challenge
    pub user: Pattern,
    /// Password challenge
    pub password: Pattern,
    /// Command prompt
    pub command: Pattern,
}

/// A device type ready for use: every pattern compiled.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    /// Device type key
    pub name: String,
    /// Client to run
    pub method: Method,
    /// TCP port
    pub port: String,
    /// Bound on each wait for a prompt
    pub timeout: Duration,
    /// Echo the raw stream
    pub debug: bool,
    /// Login and command prompts
    pub prompts: Prompts,
    /// Marker prefixed to inventory lines
    pub comment: String,
    /// Commands whose output is kept as comments
    pub inventory_commands: Vec<String>,
    /// Commands whose output is the configuration
    pub config_commands: Vec<String>,
    /// Configured unwanted lines
    pub unwanted: LineFilter,
    /// Literal filters for every command, to catch their echo
    pub echoed_commands: LineFilter,
    /// Re-prompts tolerated per login challenge
    pub login_retries: u32,
    /// Grace period before awaiting a command prompt
    pub settle: Duration,
    /// Terminator appended to every line sent
    pub line_ending: String,
}

impl DeviceProfile {
    /// Compile a configured device type.
    pub fn compile(name: &str, raw: &DeviceTypeConfig) -> Result<Self, ProfileDefect> {
        let method = match raw.method.as_deref().map(str::trim) {
            None | Some("") => return Err(ProfileDefect::MissingMethod),
            Some(method) => method.parse::<Method>().map_err(ProfileDefect::UnknownMethod)?,
        };

        let port = raw.port.as_ref().map(Number::to_text).unwrap_or_default();
        if port.is_empty() {
            return Err(ProfileDefect::MissingPort);
        }

        let timeout = match &raw.timeout {
            None => DEFAULT_TIMEOUT_SECS,
            Some(value) => match value.to_u64() {
                Some(secs) if (1..=MAX_TIMEOUT_SECS).contains(&secs) => secs,
                _ => return Err(ProfileDefect::InvalidTimeout(value.to_text())),
            },
        };

        let command_prompt = match raw.prompt.as_deref() {
            None | Some("") => return Err(ProfileDefect::MissingPrompt),
            Some(prompt) => compile_prompt("Prompt", prompt)?,
        };
        let prompts = Prompts {
            user: compile_prompt("UserPrompt", non_empty(&raw.user_prompt, DEFAULT_USER_PROMPT))?,
            password: compile_prompt(
                "PwdPrompt",
                non_empty(&raw.pwd_prompt, DEFAULT_PASSWORD_PROMPT),
            )?,
            command: command_prompt,
        };

        let echoed_commands = raw
            .cmd_inventory
            .iter()
            .chain(&raw.cmd_config)
            .filter(|cmd| !cmd.trim().is_empty())
            .map(|cmd| FilterRule::literal(cmd.trim()))
            .collect();

        Ok(Self {
            name: name.to_string(),
            method,
            port,
            timeout: Duration::from_secs(timeout),
            debug: raw.debug,
            prompts,
            comment: raw.comment.clone(),
            inventory_commands: raw.cmd_inventory.clone(),
            config_commands: raw.cmd_config.clone(),
            unwanted: LineFilter::compile(name, &raw.unwanted),
            echoed_commands,
            login_retries: raw.login_retries.unwrap_or(DEFAULT_LOGIN_RETRIES),
            settle: Duration::from_millis(raw.settle_millis.unwrap_or(DEFAULT_SETTLE_MILLIS)),
            line_ending: raw
                .line_ending
                .clone()
                .filter(|ending| !ending.is_empty())
                .unwrap_or_else(|| "\n".to_string()),
        })
    }
}

fn non_empty<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => default,
    }
}

fn compile_prompt(field: &'static str, source: &str) -> Result<Pattern, ProfileDefect> {
    Pattern::regex(source).map_err(|e| ProfileDefect::InvalidPrompt {
        field,
        reason: e.to_string(),
    })
}

/// Every configured device type, compiled or with the reason it can't be.
#[derive(Debug, Clone, Default)]
pub struct ProfileCatalog {
    profiles: HashMap<String, Result<Arc<DeviceProfile>, ProfileDefect>>,
}

impl ProfileCatalog {
    /// Compile all device types, logging each defective one.
    pub fn compile(types: &BTreeMap<String, DeviceTypeConfig>) -> Self {
        let profiles = types
            .iter()
            .map(|(name, raw)| {
                let compiled = DeviceProfile::compile(name, raw).map(Arc::new);
                if let Err(defect) = &compiled {
                    warn!(device_type = %name, "device type unusable: {defect}");
                }
                (name.clone(), compiled)
            })
            .collect();
        Self { profiles }
    }

    /// Look up a device type for pre-flight.
    pub fn lookup(&self, key: &str) -> Result<Arc<DeviceProfile>, ProfileDefect> {
        match self.profiles.get(key) {
            Some(Ok(profile)) => Ok(Arc::clone(profile)),
            Some(Err(defect)) => Err(defect.clone()),
            None => Err(ProfileDefect::UnknownType),
        }
    }

    /// Number of configured device types, usable or not.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no device type is configured.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
