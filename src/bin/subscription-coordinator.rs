//! Standalone coordinator process.
//!
//! Binds the coordinator WebSocket server and runs until Ctrl-C.
//!
//! Usage: subscription-coordinator --port 7400 [--host 0.0.0.0] [--debug]

use std::net::IpAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use subscription_hub::coordinator::config::DEFAULT_MAX_MESSAGE_SIZE;
use subscription_hub::{Coordinator, CoordinatorConfig, Result};

// ============================================================================
// CLI
// ============================================================================

/// Shared subscription coordinator for browser tabs
#[derive(Parser, Debug)]
#[command(name = "subscription-coordinator", version, about)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to bind (0 picks a free port)
    #[arg(short, long, default_value_t = 7400)]
    port: u16,

    /// Largest accepted message in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "subscription_hub=debug"
    } else {
        "subscription_hub=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let config = CoordinatorConfig::new()
        .with_ip(args.host)
        .with_port(args.port)
        .with_max_message_size(args.max_message_size);

    let coordinator = Coordinator::bind(config).await?;
    info!(url = %coordinator.ws_url(), "Coordinator listening");

    tokio::signal::ctrl_c().await?;

    info!(
        connections = coordinator.connection_count(),
        subscriptions = coordinator.dispatcher().subscription_count(),
        "Shutting down"
    );
    coordinator.shutdown().await;

    Ok(())
}
