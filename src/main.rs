//! Selective reverse proxy host.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                 PROXY HOST                        │
//!   Local client         │  ┌─────────┐   ┌───────────┐   ┌─────────────┐   │
//!   ─────────────────────┼─▶│   net   │──▶│   http    │──▶│  intercept  │   │
//!                        │  │listener │   │  server   │   │ /proxy/ ?   │   │
//!                        │  └─────────┘   └───────────┘   └──┬───────┬──┘   │
//!                        │                        no marker  │       │ allowlisted
//!                        │                                   ▼       ▼      │
//!                        │                         ┌─────────┐ ┌──────────┐ │   HTTPS
//!                        │                         │ routes  │ │ session  │─┼──────────▶ upstream
//!                        │                         │ config  │ │ cookies  │ │
//!                        │                         └─────────┘ └──────────┘ │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use selective_proxy::config::{self, AppConfig};
use selective_proxy::lifecycle::startup;
use selective_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "selective-proxy")]
#[command(about = "Local host with an allowlisted reverse proxy", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match config::load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "selective-proxy starting");

    match startup::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}
