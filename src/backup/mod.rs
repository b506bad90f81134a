//! Per-device backup pipeline
//!
//! A [`DeviceTask`] logs in with a [`LoginMachine`], collects command output
//! with a [`CommandRunner`], cleans it with a [`Sanitizer`] and hands the
//! result to [`write_backup`].

mod login;
mod runner;
mod sanitize;
mod task;
mod writer;

pub use login::{Challenge, LoginFailure, LoginMachine, LoginState};
pub use runner::{CommandFailure, CommandOutput, CommandRunner};
pub use sanitize::Sanitizer;
pub use task::{DeviceOutcome, DeviceTask, SkipReason};
pub use writer::{validate_hostname, write_backup, PersistError};
