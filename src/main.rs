use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use floodgate::config::FloodgateConfig;
use floodgate::http;
use floodgate::ratelimit::{ConfigReloader, FileConfigSource, RateLimiter};
use floodgate::store::RedisStore;

/// Distributed rate limiting service.
#[derive(Debug, Parser)]
#[command(name = "floodgate", version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP listen address from the configuration
    #[arg(long)]
    listen_addr: Option<std::net::SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    info!("Starting Floodgate Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &args.config {
        Some(path) => FloodgateConfig::from_file(path)?,
        None => FloodgateConfig::default(),
    };
    if let Some(addr) = args.listen_addr {
        config.server.listen_addr = addr;
    }
    info!(listen_addr = %config.server.listen_addr, "Configuration loaded");

    // Connect the shared counter store
    let store = Arc::new(RedisStore::connect(&config.store.redis_url).await?);

    // Initialize the rate limiter
    let limiter = Arc::new(RateLimiter::new(store, config.rate_limiting.clone()));
    info!("Rate limiter initialized");

    // Hot reload: a polling ticker pokes the reloader, which re-reads the
    // configuration file and swaps the snapshot without a restart.
    match (&args.config, config.server.config_reload_interval_secs) {
        (Some(path), interval_secs) if interval_secs > 0 => {
            let (reloader, handle) =
                ConfigReloader::new(limiter.clone(), FileConfigSource::new(path));
            tokio::spawn(reloader.run());

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
                // The first tick fires immediately; the startup config is
                // already applied.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    handle.notify();
                }
            });

            info!(interval_secs, "Configuration reload polling enabled");
        }
        _ => {
            info!("Configuration reload disabled");
        }
    }

    // Run the server with graceful shutdown on Ctrl+C or SIGTERM
    http::serve(config.server.listen_addr, limiter, shutdown_signal()).await?;

    info!("Floodgate Rate Limiting Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
