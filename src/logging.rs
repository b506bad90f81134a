//! Logging initialization
//!
//! Events go to the log file (plain text) and to stdout (compact). The
//! filter comes from `RUST_LOG`, defaulting to `ndback=info`, or
//! `ndback=debug` in debug mode.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Errors setting up logging. Fatal at start-up.
#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    /// The log file could not be created.
    #[error("cannot create log file {path}: {source}")]
    CreateFile {
        /// File that failed
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// A subscriber was already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

fn filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { "ndback=debug" } else { "ndback=info" })
    })
}

/// Truncate `log_path` and install the file and console layers.
pub fn init(log_path: &Path, debug: bool) -> Result<(), LoggingError> {
    let file = File::create(log_path).map_err(|source| LoggingError::CreateFile {
        path: log_path.display().to_string(),
        source,
    })?;

    tracing_subscriber::registry()
        .with(filter(debug))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .with(fmt::layer().compact().with_target(false))
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ndback.log");
        std::fs::write(&path, "stale line from the previous run\n").unwrap();

        // Another test may have installed a subscriber first
        if init(&path, false).is_ok() {
            tracing::info!(hostname = "sw1", "backup saved");
            let text = std::fs::read_to_string(&path).unwrap();
            assert!(!text.contains("stale line"));
            assert!(text.contains("backup saved"));
        }
    }

    #[test]
    fn test_unwritable_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("ndback.log");

        assert!(matches!(
            init(&path, false),
            Err(LoggingError::CreateFile { .. })
        ));
    }
}
