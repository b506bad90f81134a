//! Shell invocations for reaching a device

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How a device is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// OpenSSH client
    Ssh,
    /// Telnet client
    Telnet,
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssh" => Ok(Method::Ssh),
            "telnet" => Ok(Method::Telnet),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Ssh => f.write_str("ssh"),
            Method::Telnet => f.write_str("telnet"),
        }
    }
}

/// Everything needed to open one interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// Client to run
    pub method: Method,
    /// Host name or IP address of the device
    pub address: String,
    /// TCP port, as configured
    pub port: String,
    /// Login name; ssh passes it on the command line
    pub user: String,
    /// Terminator appended to every line sent
    pub line_ending: String,
    /// Bound on each write to the session
    pub timeout: Duration,
    /// Copy the raw stream to stdout
    pub echo: bool,
}

impl SessionRequest {
    /// Program and arguments that open the session.
    ///
    /// ssh runs with an empty client config and without host key checking:
    /// device keys change on every RMA and nobody maintains known_hosts for
    /// a few thousand switches.
    pub fn command_line(&self) -> (&'static str, Vec<String>) {
        match self.method {
            Method::Ssh => (
                "ssh",
                vec![
                    "-F".to_string(),
                    "/dev/null".to_string(),
                    "-o".to_string(),
                    "UserKnownHostsFile=/dev/null".to_string(),
                    "-o".to_string(),
                    "StrictHostKeyChecking=no".to_string(),
                    "-p".to_string(),
                    self.port.clone(),
                    "-l".to_string(),
                    self.user.clone(),
                    self.address.clone(),
                ],
            ),
            Method::Telnet => ("telnet", vec![self.address.clone(), self.port.clone()]),
        }
    }
}

/// Check if a child process is still alive
pub fn is_alive(child: &mut Box<dyn portable_pty::Child + Send>) -> bool {
    matches!(child.try_wait(), Ok(None))
}
