//! hostgate: host-based reverse proxy.
//!
//! ```text
//!   Client ──▶ listener ──▶ director ──▶ backend (resolved IP)
//!                 │            │
//!                 │            ├─ routing table (remote, synced)
//!                 │            └─ policy (CIDR allow-list, per listener)
//!                 │
//!   Operator ──▶ control ──▶ /reload, /status, /listeners, /routing-table
//! ```

use std::path::PathBuf;

use clap::Parser;

use hostgate::config::load_config;
use hostgate::lifecycle::{shutdown_signal, Gateway};
use hostgate::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "hostgate")]
#[command(about = "Host-based reverse proxy with CIDR allow-lists", long_about = None)]
struct Cli {
    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("hostgate: {e}");
            std::process::exit(1);
        }
    };

    if cli.check {
        println!("{}: ok ({} listeners)", cli.config.display(), config.routers.len());
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?cli.config, "hostgate starting");

    if config.observability.metrics_enabled {
        // Address already checked by validation.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let gateway = Gateway::start(config, &cli.config).await?;
    shutdown_signal().await;
    gateway.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
