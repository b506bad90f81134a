//! Per-site overrides and credential resolution

use serde::Deserialize;
use std::fmt;

/// Overrides applied to devices carrying a site key.
///
/// Empty fields fall back to the global values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SiteProfile {
    /// Backup directory for this site's devices
    pub config_dir: String,
    /// Login name for this site's devices
    pub user: String,
    /// Password for this site's devices
    pub password: String,
}

/// Login credentials for one device.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name
    pub user: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Apply a site's overrides on top of these credentials.
    pub fn with_site(&self, site: Option<&SiteProfile>) -> Credentials {
        let Some(site) = site else {
            return self.clone();
        };
        Credentials {
            user: non_empty_or(&site.user, &self.user),
            password: non_empty_or(&site.password, &self.password),
        }
    }
}

// Passwords end up in debug logs otherwise
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}

fn non_empty_or(preferred: &str, fallback: &str) -> String {
    if preferred.trim().is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}
