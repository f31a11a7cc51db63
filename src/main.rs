use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use favicon_proxy::{
    config::Config,
    observability::AppObservability,
    web::{AppState, WebServer},
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "favicon-proxy")]
#[command(version)]
#[command(about = "Resolve, cache and proxy website favicons")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_tracing(cli: &Cli) {
    let log_filter = if cli.log_level == "trace" {
        format!("favicon_proxy={},tower_http=trace", cli.log_level)
    } else {
        format!("favicon_proxy={}", cli.log_level)
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!("Starting Favicon Proxy v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    config.validate()?;

    let observability = AppObservability::new(env!("CARGO_PKG_NAME"));
    let sweep_interval = config.cache.sweep_interval;
    let state = AppState::from_config(config, observability.resolver_metrics())?;
    info!(
        loaders = ?state.favicons.loader_names(),
        ttl = %humantime::format_duration(state.config.cache.ttl),
        "Favicon service initialized"
    );

    let shutdown = CancellationToken::new();
    let sweeper = Arc::clone(state.favicons.cache()).spawn_sweeper(sweep_interval, shutdown.child_token());

    let server = WebServer::new(state)?;
    info!("Starting web server on {}:{}", server.host(), server.port());
    let served = server.serve_with_shutdown(shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!("Cache sweeper terminated abnormally: {}", e);
    }
    observability.shutdown();
    info!("Favicon Proxy stopped");

    served
}
