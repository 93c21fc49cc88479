use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pinproxy::config::{Config, Overrides};
use pinproxy::proxy::{HttpServerManager, ReverseProxy};

#[derive(Parser)]
#[command(name = "pinproxy")]
#[command(about = "Forward every request to one fixed backend, directly or over SOCKS5")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Backend URL, e.g. http://backend:9000 or socks5h://127.0.0.1:1080
    #[arg(short, long)]
    target: Option<String>,

    /// Response-header timeout in milliseconds (0 disables it)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Listen address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    #[arg(short, long)]
    verbose: bool,
}

async fn load_config(args: &Args) -> Result<Config> {
    let mut config = match (&args.config, &args.target) {
        (Some(path), _) => Config::from_file_with_env(path)
            .await
            .with_context(|| format!("failed to load configuration from {}", path))?,
        (None, Some(target)) => Config::for_target(target.clone()),
        (None, None) => anyhow::bail!("either --config or --target is required"),
    };

    config.apply_overrides(Overrides {
        target: args.target.clone(),
        timeout_ms: args.timeout_ms,
        bind: args.bind,
        level: args.verbose.then(|| "debug".to_string()),
    });
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args).await?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter_directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting pinproxy");

    let proxy = ReverseProxy::new(&config.proxy.target, config.proxy.timeout_ms)
        .context("invalid proxy target")?;

    let shutdown = CancellationToken::new();
    let server = HttpServerManager::new(config.server.bind);
    let mut server_task = tokio::spawn(server.run(proxy, shutdown.clone()));

    tokio::select! {
        result = &mut server_task => {
            result??;
        }
        result = signal::ctrl_c() => {
            result.context("failed to install CTRL+C signal handler")?;
            warn!("Received CTRL+C, shutting down gracefully...");
            shutdown.cancel();
            server_task.await??;
        }
    }

    info!("pinproxy shutdown complete");
    Ok(())
}
