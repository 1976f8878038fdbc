use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;

use support_relay::config::{FileConfig, RelayConfig, ServerConfig, load_config};
use support_relay::{RelayState, build_router, serve};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "WebSocket relay between support customers and agents")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the server (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory with the browser UI to serve
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "support_relay=debug,relay=debug,tower_http=debug,info"
    } else {
        "support_relay=info,relay=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let file_config: FileConfig = load_config(cli.config.as_deref())
        .extract()
        .context("Failed to load configuration")?;

    let mut server_config = ServerConfig::from_file(&file_config.server);
    if let Some(host) = cli.host {
        server_config.host = host;
    }
    if let Some(port) = cli.port {
        server_config.port = port;
    }
    if cli.static_dir.is_some() {
        server_config.static_dir = cli.static_dir;
    }
    let relay_config = RelayConfig::from_file(&file_config.relay);

    info!(
        "Relay config: send_queue_capacity={}, ping_interval={:?}",
        relay_config.send_queue_capacity, relay_config.ping_interval
    );

    let state = RelayState::new(relay_config);
    let app = build_router(state, server_config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(server_config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", server_config.bind_addr()))?;
    let actual_addr = listener.local_addr()?;

    info!("Relay listening on ws://{}/ws", actual_addr);

    // Create shutdown signal handler
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received shutdown signal, closing relay...");
    };

    let result = serve(listener, app, shutdown_signal).await;
    info!("Shutdown complete");
    result
}
