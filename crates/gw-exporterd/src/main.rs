//! gw-exporterd — the GoodWe exporter daemon.
//!
//! Single binary that assembles the exporter:
//! - Environment configuration (`INVERTER_IP`, `METRICS_PORT`)
//! - Sensor gauges
//! - Reader process supervisor
//! - HTTP scrape endpoint
//!
//! # Usage
//!
//! ```text
//! INVERTER_IP=192.168.1.20 METRICS_PORT=2112 gw-exporterd --script scripts/gw
//! ```
//!
//! The daemon runs until SIGINT or SIGTERM, or until a subsystem fails.
//! Every way out ends with exit code 1.

mod daemon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "gw-exporterd", about = "GoodWe inverter Prometheus exporter")]
struct Cli {
    /// Sensor reader executable.
    #[arg(long, default_value = gw_core::DEFAULT_SCRIPT_PATH)]
    script: PathBuf,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match daemon::run(cli.script).await {
        Ok(signal) => {
            info!(%signal, "exiting after signal");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "exporter failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,gw_exporterd=debug,gw_supervisor=debug")
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
