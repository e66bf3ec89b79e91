//! Command-line arguments and config file lookup.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Environment variable naming the config file.
pub(crate) const CONFIG_ENV: &str = "BINDAY_CONFIG";
/// Config file used when neither the flag nor the environment names one.
pub(crate) const DEFAULT_CONFIG: &str = "binday.toml";

#[derive(Parser, Debug)]
#[command(name = "binday")]
#[command(version, about = "Armagh Banbridge Craigavon bin collection updater", long_about = None)]
pub(crate) struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub(crate) json_logs: bool,

    #[command(subcommand)]
    pub(crate) command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Refresh on the configured interval until interrupted
    Run,
    /// Run a single update cycle and print the sensor states
    Once,
    /// Forget every stored calendar event
    Clear,
    /// Print the stored calendar events
    Events,
    /// Extract the schedule from a saved result page
    Parse {
        /// HTML file to read
        file: PathBuf,
    },
}

impl Cli {
    /// Config file to load, honouring the flag, then the environment.
    pub(crate) fn config_path(&self) -> PathBuf {
        resolve_config_path(self.config.clone(), env::var_os(CONFIG_ENV))
    }
}

fn resolve_config_path(flag: Option<PathBuf>, env: Option<OsString>) -> PathBuf {
    flag.or_else(|| env.filter(|value| !value.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}
