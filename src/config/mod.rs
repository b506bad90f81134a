//! Configuration loading
//!
//! The file is TOML with PascalCase keys:
//!
//! ```toml
//! User = "backup"
//! Password = "secret"
//! DeviceDB = "devices.csv"
//! ConfigDir = "/var/backups/net"
//! LogFile = "/var/log/ndback.log"
//! Threads = "8"
//!
//! [Type.cisco]
//! Method = "ssh"
//! Port = "22"
//! Prompt = "#$"
//! Comment = "!"
//! CmdInventory = ["show version"]
//! CmdConfig = ["show running-config"]
//!
//! [Site.dc1]
//! ConfigDir = "/var/backups/dc1"
//! ```
//!
//! Loading happens in two steps. [`Config::load`] reads and validates the
//! file; [`Settings::from_config`] compiles every device type once. The split
//! lets the binary open the log file named in the configuration before
//! compile warnings are emitted.

mod profile;
mod site;

pub use profile::{
    DeviceProfile, DeviceTypeConfig, ProfileCatalog, ProfileDefect, Prompts,
    DEFAULT_LOGIN_RETRIES, DEFAULT_SETTLE_MILLIS, DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS,
};
pub use site::{Credentials, SiteProfile};

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Semaphore;

/// Errors that abort the run before any device is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid TOML or has the wrong shape.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A mandatory key is missing or empty.
    #[error("{0} is a mandatory parameter")]
    MissingField(&'static str),

    /// A numeric key does not hold a number in range.
    #[error("{field} must be a whole number in range, got \"{value}\"")]
    InvalidNumber {
        /// Configuration key
        field: &'static str,
        /// Offending value
        value: String,
    },
}

/// A number that legacy files write as a string (`Threads = "8"`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Number {
    /// Written as a TOML integer
    Int(i64),
    /// Written as a TOML string
    Text(String),
}

impl Number {
    /// The value as text, trimmed.
    pub fn to_text(&self) -> String {
        match self {
            Number::Int(n) => n.to_string(),
            Number::Text(s) => s.trim().to_string(),
        }
    }

    /// The value as an unsigned integer, if it is one.
    pub fn to_u64(&self) -> Option<u64> {
        match self {
            Number::Int(n) => u64::try_from(*n).ok(),
            Number::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// The configuration file as written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Config {
    /// Global login name
    pub user: String,
    /// Global password
    pub password: String,
    /// Path of the device list
    #[serde(rename = "DeviceDB")]
    pub device_db: String,
    /// Global backup directory
    pub config_dir: String,
    /// Path of the log file
    pub log_file: String,
    /// Maximum concurrent sessions; unset or 0 means twice the CPU count
    pub threads: Option<Number>,
    /// Device types by key
    #[serde(rename = "Type")]
    pub types: BTreeMap<String, DeviceTypeConfig>,
    /// Site overrides by key
    #[serde(rename = "Site")]
    pub sites: BTreeMap<String, SiteProfile>,
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse and validate configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mandatory = [
            ("User", &self.user),
            ("Password", &self.password),
            ("DeviceDB", &self.device_db),
            ("ConfigDir", &self.config_dir),
            ("LogFile", &self.log_file),
        ];
        for (field, value) in mandatory {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field));
            }
        }
        self.concurrency()?;
        Ok(())
    }

    /// Maximum number of simultaneous sessions.
    ///
    /// At most [`Semaphore::MAX_PERMITS`].
    pub fn concurrency(&self) -> Result<usize, ConfigError> {
        let invalid = |value: &Number| ConfigError::InvalidNumber {
            field: "Threads",
            value: value.to_text(),
        };
        let configured = match &self.threads {
            None => 0,
            Some(Number::Text(s)) if s.trim().is_empty() => 0,
            Some(value) => value
                .to_u64()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|&n| n <= Semaphore::MAX_PERMITS)
                .ok_or_else(|| invalid(value))?,
        };
        if configured == 0 {
            Ok(default_concurrency())
        } else {
            Ok(configured)
        }
    }

    /// Path of the log file.
    pub fn log_path(&self) -> PathBuf {
        PathBuf::from(&self.log_file)
    }
}

/// Twice the available processing units.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

/// Immutable run-wide settings shared by every device task.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Global credentials
    pub credentials: Credentials,
    /// Path of the device list
    pub device_db: PathBuf,
    /// Global backup directory
    pub config_dir: PathBuf,
    /// Maximum number of simultaneous sessions
    pub concurrency: usize,
    /// Compiled device types
    pub profiles: ProfileCatalog,
    /// Site overrides by key
    pub sites: HashMap<String, SiteProfile>,
}

impl Settings {
    /// Compile a validated configuration.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let concurrency = config.concurrency()?;
        Ok(Self {
            credentials: Credentials::new(config.user, config.password),
            device_db: PathBuf::from(config.device_db),
            config_dir: PathBuf::from(config.config_dir),
            concurrency,
            profiles: ProfileCatalog::compile(&config.types),
            sites: config.sites.into_iter().collect(),
        })
    }

    /// Parse, validate and compile configuration text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Self::from_config(Config::parse(text)?)
    }

    fn site(&self, key: Option<&str>) -> Option<&SiteProfile> {
        key.and_then(|k| self.sites.get(k))
    }

    /// Credentials for a device with the given site key.
    pub fn credentials_for(&self, site: Option<&str>) -> Credentials {
        self.credentials.with_site(self.site(site))
    }

    /// Backup directory for a device with the given site key.
    pub fn backup_dir_for(&self, site: Option<&str>) -> PathBuf {
        match self.site(site) {
            Some(site) if !site.config_dir.trim().is_empty() => PathBuf::from(&site.config_dir),
            _ => self.config_dir.clone(),
        }
    }
}
