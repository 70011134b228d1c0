//! LoupGuard - perception-and-response controller
//!
//! Main entry point for the LoupGuard CLI and controller.

mod cli;
mod register;
mod server;
mod status;

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use loupguard_config::{ConfigLoader, Settings};
use loupguard_core::OutboundMessage;
use loupguard_link::{encode_payload, tx_frame};

use cli::{Cli, Commands, RunArgs};
use register::Plan;
use server::run_server;

/// LoupGuard home directory.
fn loupguard_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".loupguard"))
        .unwrap_or_else(|| PathBuf::from(".loupguard"))
}

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.loupguard/logs/ with daily rotation.
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = loupguard_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("loupguard")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes the file writer on drop; keep it for the whole run.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Load settings from `path`, or run on defaults when the file is absent.
pub(crate) fn load_settings(path: &Path) -> Result<Settings, Box<dyn std::error::Error>> {
    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(Settings::new());
    }
    let settings = ConfigLoader::load(path)?;
    info!("Loaded {} settings from {}", settings.len(), path.display());
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            init_tracing()?;
            run_server(&cli.config, RunArgs::default()).await
        }
        Some(Commands::Run(args)) => {
            init_tracing()?;
            run_server(&cli.config, args).await
        }
        Some(Commands::CheckConfig) => check_config(&cli.config),
        Some(Commands::Encode { payload }) => {
            print!("{}", encode_frame(&payload));
            Ok(())
        }
    }
}

/// Validate every worker's options and print the effective settings.
fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let settings = if path.exists() {
        ConfigLoader::load(path)?
    } else {
        println!("# {} not found, showing defaults", path.display());
        Settings::new()
    };
    let plan = Plan::new(settings, &RunArgs::default())?;

    println!("# workers: {}", plan.worker_names().join(", "));
    let mut entries: Vec<_> = plan.settings().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in entries {
        println!("{key} = {value}");
    }
    println!("# configuration OK");
    Ok(())
}

/// Frame written to the radio for `payload`. A JSON object is sent as a
/// record, anything else as text.
fn encode_frame(payload: &str) -> String {
    let message = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(serde_json::Value::Object(map)) => OutboundMessage::Record(map),
        _ => OutboundMessage::Text(payload.to_string()),
    };
    tx_frame(&encode_payload(&message))
}
