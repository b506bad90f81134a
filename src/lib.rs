//! ndback: concurrent configuration backup for network devices
//!
//! ndback logs into every device of a device list through the system `ssh`
//! or `telnet` client running on a pseudo-terminal, runs the inventory and
//! configuration commands of the device's type, strips prompts, echoed
//! commands and unwanted lines from the output and writes one backup file
//! per device. Devices are processed in parallel, at most
//! `Settings::concurrency` at a time.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ndback::{load_devices, Config, PtyConnector, Scheduler, Settings};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_config(Config::load(Path::new("ndback.conf"))?)?;
//!     let devices = load_devices(&settings.device_db)?;
//!
//!     let summary = Scheduler::new(Arc::new(settings), PtyConnector::default())
//!         .run(devices)
//!         .await;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! # Sessions
//!
//! The login and command logic only needs the [`Transport`] trait: send a
//! line, wait for one of several patterns. [`PtySession`] implements it over
//! a pseudo-terminal; [`ScriptedTransport`] replays canned device output.
//!
//! ```rust,no_run
//! use ndback::{Method, Pattern, PtySession, SessionRequest, Transport};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = SessionRequest {
//!     method: Method::Telnet,
//!     address: "192.0.2.1".to_string(),
//!     port: "23".to_string(),
//!     user: "backup".to_string(),
//!     line_ending: "\r\n".to_string(),
//!     timeout: Duration::from_secs(30),
//!     echo: false,
//! };
//! let mut session = PtySession::builder().spawn(&request)?;
//!
//! let user = Pattern::regex("ogin:")?;
//! let password = Pattern::regex("assword:")?;
//! let result = session
//!     .expect_any(&[&user, &password], Duration::from_secs(30))
//!     .await?;
//! println!("device asked for challenge {}", result.pattern_index);
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backup;
mod buffer;
pub mod cli;
pub mod config;
mod inventory;
pub mod logging;
mod pattern;
mod result;
mod scheduler;
mod session;

// Public API exports
pub use backup::{DeviceOutcome, DeviceTask, LoginFailure, PersistError, Sanitizer, SkipReason};
pub use buffer::{strip_ansi, strip_ansi_str, AnsiStripper, StreamBuffer};
pub use config::{Config, ConfigError, Credentials, DeviceProfile, ProfileDefect, Settings};
pub use inventory::{load_devices, parse_devices, DeviceRecord, InventoryError};
pub use pattern::{FilterRule, LineFilter, Pattern, Verdict};
pub use result::{MatchResult, PatternError, TransportError};
pub use scheduler::{RunSummary, Scheduler};
pub use session::{
    Connector, DeviceScript, Method, PtyConnector, PtySession, ScriptStats, ScriptedConnector,
    ScriptedTransport, SessionBuilder, SessionRequest, Transport,
};
