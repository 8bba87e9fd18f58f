//! Print Lasso Daemon - Main entry point
//!
//! Discovers Bambu Lab printers over SSDP and serves the printer registry API.

mod advertise;
mod api;
mod config;
mod relay;
mod server;
mod state;

use anyhow::Result;
use clap::Parser;
use lasso_core::Discovered;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::secs;

#[derive(Parser, Debug)]
#[command(name = "print-lasso")]
#[command(about = "Bambu Lab printer discovery and registry daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "print-lasso.toml")]
    config: PathBuf,

    /// Bind address for the API server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single discovery and exit
    #[arg(long)]
    discover_once: bool,

    /// With --discover-once, report every SSDP responder
    #[arg(long)]
    include_all: bool,

    /// With --discover-once, listen window in seconds
    #[arg(long)]
    timeout: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Print Lasso v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        bind = %config.daemon.bind,
        data_file = %config.daemon.data_file,
        ssdp_timeout_secs = config.discovery.ssdp_timeout_secs,
        "Configuration loaded"
    );

    if args.discover_once {
        let scanner = lasso_discovery::SsdpScanner::new(config.to_scanner_config());
        let found = scanner
            .discover(args.timeout.map(secs), args.include_all)
            .await;
        print_discovered(&found);
        return Ok(());
    }

    let state = state::AppState::new(config.clone())?;
    server::run(state, &config.daemon.bind).await
}

fn print_discovered(found: &[Discovered]) {
    println!("Discovered {} device(s):", found.len());
    for entry in found {
        match entry {
            Discovered::Printer(printer) => {
                println!(
                    "  - {} ({}) at {}",
                    printer.name, printer.serial_number, printer.ip_address
                );
                if !printer.model.is_empty() {
                    println!("    Model: {}", printer.model);
                }
                if !printer.dev_version.is_empty() {
                    println!("    Firmware: {}", printer.dev_version);
                }
            }
            Discovered::Raw(device) => {
                println!(
                    "  - {} [{}] at {}:{}",
                    device.name, device.st, device.ip_address, device.port
                );
                if !device.server.is_empty() {
                    println!("    Server: {}", device.server);
                }
            }
        }
    }
}
