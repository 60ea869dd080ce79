//! NalaBranch daemon entry point.
//!
//! Loads configuration, initializes logging and the branch register, then
//! serves the HTTP API until a shutdown signal arrives.

mod signals;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nalabranch_core::config::AppConfig;
use nalabranch_web::WebServer;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// NalaBranch identifier resolution daemon.
#[derive(Parser, Debug)]
#[command(
    name = "nalabranch-daemon",
    version,
    about = "Serve canonical branch identifier resolution over HTTP"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Override the listen address from the config file.
    #[arg(long)]
    listen: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load and validate configuration
    let mut config =
        AppConfig::load_from_file(&args.config).context("failed to load configuration file")?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(log_level) = args.log_level {
        config.server.log_level = log_level;
    }
    config
        .validate()
        .context("configuration validation failed")?;

    // Initialize tracing
    let filter = EnvFilter::try_new(&config.server.log_level)
        .with_context(|| format!("invalid log level '{}'", config.server.log_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    // Startup banner
    info!("========================================");
    info!("  NalaBranch Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Config file   : {}", args.config.display());
    info!("Listen        : {}", config.server.listen);
    info!("GUID layout   : {}", config.branch.guid_layout);
    info!("Claim header  : {}", config.branch.claim_header);
    match &config.branch.register_file {
        Some(path) => info!("Register      : {}", path.display()),
        None => info!("Register      : (none)"),
    }
    info!("Log level     : {}", config.server.log_level);
    info!("========================================");

    let listen_addr = config.server.listen.clone();
    let web_server = WebServer::new(config).context("failed to load branch register")?;

    web_server
        .start(&listen_addr, signals::wait_for_shutdown())
        .await
        .context("web server error")?;

    info!("NalaBranch daemon stopped.");
    Ok(())
}
