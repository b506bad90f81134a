//! The backup pipeline of a single device

use super::login::{LoginFailure, LoginMachine};
use super::runner::{CommandOutput, CommandRunner};
use super::sanitize::Sanitizer;
use super::writer::{write_backup, PersistError};
use crate::config::{Credentials, DeviceProfile, ProfileDefect, Settings};
use crate::inventory::DeviceRecord;
use crate::result::TransportError;
use crate::session::{Connector, SessionRequest, Transport};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};

/// Why a device was not backed up at all.
#[derive(Error, Debug)]
pub enum SkipReason {
    /// The device type is unknown or unusable.
    #[error("configuration error: {0}")]
    Config(ProfileDefect),

    /// The session could not be opened.
    #[error("connection failed: {0}")]
    Connect(TransportError),

    /// The login did not reach the command prompt.
    #[error("login failed: {0}")]
    Auth(LoginFailure),
}

/// Final state of one device.
#[derive(Debug)]
pub enum DeviceOutcome {
    /// A backup file was written.
    Saved {
        /// File written
        path: PathBuf,
        /// A command failed and the remaining ones were abandoned
        partial: bool,
        /// Sanitized inventory lines written
        inventory_lines: usize,
        /// Sanitized configuration lines written
        config_lines: usize,
    },
    /// Nothing was attempted past the failing step.
    Skipped(SkipReason),
    /// Output was captured but could not be written.
    Unsaved(PersistError),
}

/// Everything one device needs, resolved before the task is admitted.
#[derive(Debug, Clone)]
pub struct DeviceTask {
    device: DeviceRecord,
    profile: Arc<DeviceProfile>,
    credentials: Credentials,
    backup_dir: PathBuf,
    echo: bool,
}

impl DeviceTask {
    /// Resolve the device's profile, credentials and backup directory.
    ///
    /// Fails when the device type is unknown or defective; such a device is
    /// never connected to.
    pub fn prepare(settings: &Settings, device: DeviceRecord) -> Result<Self, ProfileDefect> {
        let profile = settings.profiles.lookup(&device.device_type)?;
        let site = device.site.as_deref();
        Ok(Self {
            credentials: settings.credentials_for(site),
            backup_dir: settings.backup_dir_for(site),
            echo: profile.debug,
            profile,
            device,
        })
    }

    /// Copy the raw session stream to stdout.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo |= echo;
        self
    }

    /// The device being backed up.
    pub fn device(&self) -> &DeviceRecord {
        &self.device
    }

    /// Where the backup file goes.
    pub fn backup_dir(&self) -> &PathBuf {
        &self.backup_dir
    }

    /// The session this task opens.
    pub fn request(&self) -> SessionRequest {
        SessionRequest {
            method: self.profile.method,
            address: self.device.address.clone(),
            port: self.profile.port.clone(),
            user: self.credentials.user.clone(),
            line_ending: self.profile.line_ending.clone(),
            timeout: self.profile.timeout,
            echo: self.echo,
        }
    }

    /// Run the pipeline: connect, log in, run the inventory and configuration
    /// commands, sanitize and write. The session is closed on every path
    /// once it was opened.
    pub async fn run<C: Connector>(self, connector: &C) -> DeviceOutcome {
        let span = info_span!("device", hostname = %self.device.hostname);
        self.execute(connector).instrument(span).await
    }

    async fn execute<C: Connector>(self, connector: &C) -> DeviceOutcome {
        let request = self.request();
        info!(
            address = %request.address,
            method = %request.method,
            port = %request.port,
            "connecting"
        );

        let mut transport = match connector.connect(&request).await {
            Ok(transport) => transport,
            Err(e) => {
                error!("connection failed: {e}");
                return DeviceOutcome::Skipped(SkipReason::Connect(e));
            }
        };

        let outcome = self.backup(&mut transport).await;
        transport.close().await;
        outcome
    }

    async fn backup<T: Transport>(&self, transport: &mut T) -> DeviceOutcome {
        let profile = &*self.profile;

        let login = LoginMachine::new(
            &profile.prompts,
            &self.credentials,
            profile.login_retries,
            profile.timeout,
        );
        if let Err(failure) = login.run(transport).await {
            error!("login failed: {failure}");
            return DeviceOutcome::Skipped(SkipReason::Auth(failure));
        }
        info!(user = %self.credentials.user, "logged in");

        let runner = CommandRunner::new(&profile.prompts.command, profile.timeout).settle(profile.settle);

        let inventory = runner.run(transport, &profile.inventory_commands).await;
        let config = if inventory.is_complete() {
            runner.run(transport, &profile.config_commands).await
        } else {
            CommandOutput::default()
        };

        let failure = inventory.failure.as_ref().or(config.failure.as_ref());
        if let Some(failure) = failure {
            warn!("{failure}; remaining commands abandoned, saving partial backup");
        }

        let sanitizer = Sanitizer::for_profile(profile);
        let inventory_lines = sanitizer.sanitize(&inventory.blocks, &profile.comment);
        let config_lines = sanitizer.sanitize(&config.blocks, "");

        match write_backup(
            &self.backup_dir,
            &self.device.hostname,
            &inventory_lines,
            &config_lines,
        )
        .await
        {
            Ok(path) => {
                info!(
                    path = %path.display(),
                    inventory = inventory_lines.len(),
                    config = config_lines.len(),
                    partial = failure.is_some(),
                    "backup saved"
                );
                DeviceOutcome::Saved {
                    path,
                    partial: failure.is_some(),
                    inventory_lines: inventory_lines.len(),
                    config_lines: config_lines.len(),
                }
            }
            Err(e) => {
                error!("backup not saved: {e}");
                DeviceOutcome::Unsaved(e)
            }
        }
    }
}
