//! Persisting backup files

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Errors writing a backup file. Fatal to the device only.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The hostname cannot be used as a file name.
    #[error("hostname {0:?} is not a valid file name")]
    InvalidHostname(String),

    /// The backup directory could not be created.
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        /// Directory that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The backup file could not be created or truncated.
    #[error("cannot create {path}: {source}")]
    CreateFile {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Writing the content failed.
    #[error("cannot write {path}: {source}")]
    Write {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// Check that `hostname` names a file directly inside the backup directory.
pub fn validate_hostname(hostname: &str) -> Result<(), PersistError> {
    let invalid = hostname.trim().is_empty()
        || hostname == "."
        || hostname.contains("..")
        || hostname.contains(['/', '\\', '\0']);
    if invalid {
        return Err(PersistError::InvalidHostname(hostname.to_string()));
    }
    Ok(())
}

/// Write `inventory` then `config` lines to `dir/hostname`, replacing any
/// previous backup. The directory is created if needed.
pub async fn write_backup(
    dir: &Path,
    hostname: &str,
    inventory: &[String],
    config: &[String],
) -> Result<PathBuf, PersistError> {
    validate_hostname(hostname)?;

    fs::create_dir_all(dir)
        .await
        .map_err(|source| PersistError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

    let path = dir.join(hostname);
    let file = fs::File::create(&path)
        .await
        .map_err(|source| PersistError::CreateFile {
            path: path.clone(),
            source,
        })?;

    let mut writer = BufWriter::new(file);
    let written = async {
        for line in inventory.iter().chain(config) {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await
    }
    .await;

    written.map_err(|source| PersistError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
