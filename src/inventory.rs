//! Device list loading
//!
//! One device per line, semicolon separated:
//!
//! ```text
//! # hostname;address;type;site
//! core-sw1;192.0.2.1;cisco;dc1
//! edge-rt1;192.0.2.2;juniper
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column separator.
const SEPARATOR: char = ';';

/// Comment marker at the start of a line.
const COMMENT: char = '#';

/// One backup target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    /// Name of the backup file
    pub hostname: String,
    /// Host name or IP address to connect to
    pub address: String,
    /// Device type key
    pub device_type: String,
    /// Site key, if any
    pub site: Option<String>,
}

impl DeviceRecord {
    /// Create a record without a site.
    pub fn new(
        hostname: impl Into<String>,
        address: impl Into<String>,
        device_type: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
            device_type: device_type.into(),
            site: None,
        }
    }

    /// Attach a site key.
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }
}

/// Errors loading the device list. All of them abort the run.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// The file could not be read.
    #[error("cannot read device list {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// A line does not describe a device.
    #[error("device list line {line}: {reason}")]
    MalformedLine {
        /// 1-based line number
        line: usize,
        /// What is wrong
        reason: String,
    },
}

/// Load the device list at `path`.
pub fn load_devices(path: &Path) -> Result<Vec<DeviceRecord>, InventoryError> {
    let text = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_devices(&text)
}

/// Parse device list text, preserving line order.
pub fn parse_devices(text: &str) -> Result<Vec<DeviceRecord>, InventoryError> {
    let mut devices = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(COMMENT) {
            continue;
        }

        let fields: Vec<&str> = line.split(SEPARATOR).map(str::trim).collect();
        let malformed = |reason: &str| InventoryError::MalformedLine {
            line: idx + 1,
            reason: reason.to_string(),
        };

        if fields.len() < 3 {
            return Err(malformed("expected hostname;address;type[;site]"));
        }
        for (name, value) in ["hostname", "address", "type"].iter().zip(&fields) {
            if value.is_empty() {
                return Err(malformed(&format!("empty {name}")));
            }
        }

        devices.push(DeviceRecord {
            hostname: fields[0].to_string(),
            address: fields[1].to_string(),
            device_type: fields[2].to_string(),
            site: fields
                .get(3)
                .filter(|site| !site.is_empty())
                .map(|site| site.to_string()),
        });
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_with_and_without_site() {
        let devices = parse_devices("core-sw1;192.0.2.1;cisco;dc1\nedge-rt1;192.0.2.2;juniper\n").unwrap();
        assert_eq!(
            devices,
            vec![
                DeviceRecord::new("core-sw1", "192.0.2.1", "cisco").with_site("dc1"),
                DeviceRecord::new("edge-rt1", "192.0.2.2", "juniper"),
            ]
        );
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let text = "# hostname;address;type\n\n   \n  # indented comment\nsw1;10.0.0.1;cisco\n";
        let devices = parse_devices(text).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].hostname, "sw1");
    }

    #[test]
    fn test_fields_trimmed_and_empty_site_ignored() {
        let devices = parse_devices(" sw1 ; 10.0.0.1 ;cisco; \r\n").unwrap();
        assert_eq!(devices[0], DeviceRecord::new("sw1", "10.0.0.1", "cisco"));
    }

    #[test]
    fn test_too_few_columns() {
        let err = parse_devices("sw1;10.0.0.1;cisco\nsw2;10.0.0.2\n").unwrap_err();
        match err {
            InventoryError::MalformedLine { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_column() {
        let err = parse_devices(";10.0.0.1;cisco").unwrap_err();
        assert_eq!(err.to_string(), "device list line 1: empty hostname");
    }

    #[test]
    fn test_order_preserved() {
        let text: String = (0..50).map(|i| format!("sw{i};10.0.0.{i};cisco\n")).collect();
        let devices = parse_devices(&text).unwrap();
        let names: Vec<_> = devices.iter().map(|d| d.hostname.clone()).collect();
        let expected: Vec<_> = (0..50).map(|i| format!("sw{i}")).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sw1;10.0.0.1;cisco").unwrap();

        let devices = load_devices(file.path()).unwrap();
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_devices(Path::new("/nonexistent/devices.csv")),
            Err(InventoryError::Io { .. })
        ));
    }
}
