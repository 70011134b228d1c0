//! CLI definitions for LoupGuard.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// LoupGuard CLI.
#[derive(Parser)]
#[command(name = "loupguard")]
#[command(about = "Perception-and-response controller: debounced trigger, radio alerts, sweep actuator")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the controller in foreground (default)
    Run(RunArgs),

    /// Load and validate the configuration, then print the effective settings
    CheckConfig,

    /// Print the exact frame written to the radio for a payload
    Encode {
        /// Payload text
        payload: String,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct RunArgs {
    /// Drive a simulated stepper instead of hardware
    #[arg(long)]
    pub simulate: bool,

    /// Feed detections from a JSON-lines file instead of the camera
    #[arg(long, env = "LOUPGUARD_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Address of the read-only status endpoint
    #[arg(long, env = "LOUPGUARD_STATUS_ADDR")]
    pub status_addr: Option<SocketAddr>,
}
