//! Command-line arguments

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG: &str = "./ndback.conf";

/// Arguments of the `ndback` binary.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "ndback")]
#[command(author, version, about = "Back up network device configurations over ssh/telnet", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Args {
    /// Configuration file
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Debug logging and echo of every session to stdout
    #[arg(short, long)]
    pub debug: bool,

    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    pub version: Option<bool>,
}
