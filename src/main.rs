//! ndback: back up the configuration of every device in the device list.

use anyhow::{Context, Result};
use clap::Parser;
use ndback::cli::Args;
use ndback::{load_devices, logging, Config, PtyConnector, Scheduler, Settings};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("loading configuration {}", args.config.display()))?;
    logging::init(&config.log_path(), args.debug).context("setting up logging")?;

    info!("ndback v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::from_config(config).context("compiling configuration")?;
    let devices = load_devices(&settings.device_db)
        .with_context(|| format!("loading device list {}", settings.device_db.display()))?;
    info!(
        devices = devices.len(),
        device_types = settings.profiles.len(),
        concurrency = settings.concurrency,
        "configuration loaded"
    );

    Scheduler::new(Arc::new(settings), PtyConnector::default())
        .debug(args.debug)
        .run(devices)
        .await;

    Ok(())
}
