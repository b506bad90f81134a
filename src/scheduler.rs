//! Bounded-concurrency admission of device tasks

use crate::backup::{DeviceOutcome, DeviceTask, SkipReason};
use crate::config::Settings;
use crate::inventory::DeviceRecord;
use crate::session::Connector;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

/// Per-outcome device counts of one run.
///
/// Every submitted device lands in exactly one bucket other than `partial`,
/// which counts the saved backups that are incomplete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Devices submitted
    pub total: usize,
    /// Backup file written
    pub saved: usize,
    /// Saved, but a command failed
    pub partial: usize,
    /// Unknown or defective device type
    pub skipped_config: usize,
    /// Session could not be opened
    pub skipped_connect: usize,
    /// Login failed
    pub skipped_auth: usize,
    /// Output captured, file not written
    pub unsaved: usize,
    /// Tasks that panicked or were cancelled
    pub aborted: usize,
}

impl RunSummary {
    /// Count a finished device.
    pub fn record(&mut self, outcome: &DeviceOutcome) {
        match outcome {
            DeviceOutcome::Saved { partial, .. } => {
                self.saved += 1;
                if *partial {
                    self.partial += 1;
                }
            }
            DeviceOutcome::Skipped(SkipReason::Config(_)) => self.skipped_config += 1,
            DeviceOutcome::Skipped(SkipReason::Connect(_)) => self.skipped_connect += 1,
            DeviceOutcome::Skipped(SkipReason::Auth(_)) => self.skipped_auth += 1,
            DeviceOutcome::Unsaved(_) => self.unsaved += 1,
        }
    }

    /// Number of devices with a known outcome.
    pub fn accounted(&self) -> usize {
        self.saved
            + self.skipped_config
            + self.skipped_connect
            + self.skipped_auth
            + self.unsaved
            + self.aborted
    }

    fn record_joined(&mut self, joined: Result<DeviceOutcome, JoinError>) {
        match joined {
            Ok(outcome) => self.record(&outcome),
            Err(e) => {
                error!("device task aborted: {e}");
                self.aborted += 1;
            }
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} devices: {} saved ({} partial), {} skipped (config {}, connect {}, auth {}), {} unsaved, {} aborted",
            self.total,
            self.saved,
            self.partial,
            self.skipped_config + self.skipped_connect + self.skipped_auth,
            self.skipped_config,
            self.skipped_connect,
            self.skipped_auth,
            self.unsaved,
            self.aborted,
        )
    }
}

/// Runs device tasks with at most `Settings::concurrency` of them in flight.
///
/// Devices are admitted in list order; a device waits for a free slot only
/// after every earlier device was admitted. Devices whose type is unknown or
/// defective are skipped without taking a slot.
///
/// # Examples
///
/// ```no_run
/// use ndback::{load_devices, Config, PtyConnector, Scheduler, Settings};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = Arc::new(Settings::from_config(Config::load(Path::new("ndback.conf"))?)?);
/// let devices = load_devices(&settings.device_db)?;
///
/// let summary = Scheduler::new(settings, PtyConnector::default()).run(devices).await;
/// println!("{summary}");
/// # Ok(())
/// # }
/// ```
pub struct Scheduler<C: Connector> {
    settings: Arc<Settings>,
    connector: Arc<C>,
    debug: bool,
}

impl<C: Connector> Scheduler<C> {
    /// Create a scheduler opening sessions through `connector`.
    pub fn new(settings: Arc<Settings>, connector: C) -> Self {
        Self {
            settings,
            connector: Arc::new(connector),
            debug: false,
        }
    }

    /// Echo every session's raw stream to stdout.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Back up `devices` and wait for every admitted task to finish.
    pub async fn run(&self, devices: Vec<DeviceRecord>) -> RunSummary {
        let slots = self.settings.concurrency.clamp(1, Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(slots));
        let mut tasks = JoinSet::new();
        let mut summary = RunSummary::default();

        info!(devices = devices.len(), slots, "starting backup run");

        for device in devices {
            summary.total += 1;

            let hostname = device.hostname.clone();
            let device_type = device.device_type.clone();
            let task = match DeviceTask::prepare(&self.settings, device) {
                Ok(task) => task.echo(self.debug),
                Err(defect) => {
                    warn!(
                        hostname = %hostname,
                        device_type = %device_type,
                        "skipped, configuration error: {defect}"
                    );
                    summary.record(&DeviceOutcome::Skipped(SkipReason::Config(defect)));
                    continue;
                }
            };

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(hostname = %hostname, "no slot available: {e}");
                    summary.aborted += 1;
                    continue;
                }
            };

            while let Some(joined) = tasks.try_join_next() {
                summary.record_joined(joined);
            }

            let connector = Arc::clone(&self.connector);
            tasks.spawn(async move {
                let outcome = task.run(connector.as_ref()).await;
                drop(permit);
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            summary.record_joined(joined);
        }

        info!("run complete: {summary}");
        summary
    }
}
