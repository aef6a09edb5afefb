use anyhow::Result;
use clap::Parser;
use sensorboard_server::config::LogFormat;
use sensorboard_server::{AppState, ServerConfig, create_router, init_metrics};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

/// IoT sensor dashboard server
#[derive(Debug, Parser)]
#[command(name = "sensorboard-server", version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "SENSORBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config);
    info!("Starting Sensorboard Server v{}", env!("CARGO_PKG_VERSION"));
    match &args.config {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration file given, using defaults"),
    }

    init_metrics();

    let backend = config.build_backend()?;
    if let Err(e) = backend.ping().await {
        warn!(
            "Cache backend '{}' not reachable at startup, serving uncached: {}",
            backend.name(),
            e
        );
    }

    let addr = config.server_addr();
    let state = AppState::new(config, backend)?;
    state.sessions.start_cleanup(SESSION_CLEANUP_INTERVAL);

    let app = create_router(state);

    info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
