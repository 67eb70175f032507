//! AgriConnect Checkout Server
//!
//! Browser-facing backend for the storefront checkout: places per-farm
//! orders, hands bank transfers to VNPay and reconciles the gateway return.

mod api;
mod config;
mod server;
mod shutdown;
mod state;
mod sweeper;

use clap::Parser;
use config::ConfigLoader;
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// AgriConnect checkout - order placement and VNPay reconciliation
#[derive(Parser, Debug)]
#[command(name = "agri-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./agri-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override the storefront backend base URL
    #[arg(long, env = "AGRI_BACKEND_URL")]
    backend_url: Option<Url>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting agri-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(
        &args.config,
        args.listen,
        args.backend_url,
    ));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    tracing::info!(
        backend = %loaded_config.backend.base_url,
        "Configuration loaded from {:?}",
        args.config
    );

    // HTTP client for the storefront backend
    let http = state::build_http_client(loaded_config.backend.timeout)?;

    // Convert to shared config with separate locks for each section
    let shared_config = loaded_config.into_shared();

    // Create application state
    let state = AppState::new(shared_config, http);

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(state.clone(), config_loader);

    // Evict idle browser sessions in the background
    let sweeper_shutdown = sweeper::spawn_session_sweeper(state.clone());

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Signal the background tasks to stop
    shutdown_notify.notify_one();
    let _ = sweeper_shutdown.send(true);
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
