//! Web server and HTTP surface
//!
//! A single favicon endpoint plus a health check, wrapped in permissive
//! CORS and request logging.

use anyhow::Result;
use axum::{Router, routing::get};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::observability::ResolverMetrics;
use crate::services::FaviconService;
use crate::utils::{UpstreamScheme, build_http_client};

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod responses;


/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub favicons: Arc<FaviconService>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn from_config(config: Config, metrics: Arc<dyn ResolverMetrics>) -> AppResult<Self> {
        Self::build(config, UpstreamScheme::default(), metrics)
    }

    pub fn build(
        config: Config,
        scheme: UpstreamScheme,
        metrics: Arc<dyn ResolverMetrics>,
    ) -> AppResult<Self> {
        let client = build_http_client(&config.resolver)?;
        let favicons = FaviconService::from_config(&config, client, scheme, metrics)?;

        Ok(Self {
            config: Arc::new(config),
            favicons: Arc::new(favicons),
            started_at: chrono::Utc::now(),
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::favicon::get_favicon))
        .route("/health", get(handlers::health::health_check))
        .layer(axum::middleware::from_fn(middleware::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState) -> AppResult<Self> {
        let bind = state.config.bind_address();
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| AppError::configuration(format!("Invalid listen address '{bind}': {e}")))?;

        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    /// Get the host address
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Serve until SIGINT/SIGTERM or until `shutdown` is cancelled, then
    /// drain in-flight requests.
    pub async fn serve_with_shutdown(self, shutdown: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.addr, e))?;

        info!("Web server listening on http://{}", self.addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;
        Ok(())
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        }
        _ = shutdown.cancelled() => {
            info!("Web server received cancellation signal, shutting down gracefully");
        }
    }
}
