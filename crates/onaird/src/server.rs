//! HTTP server for onaird

use crate::proxy::Upstream;
use crate::routes;
use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::Router;
use onair_common::ProxyConfig;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    pub upstream: Upstream,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let upstream = Upstream::new(config).context("Failed to build upstream HTTP client")?;
        Ok(Self {
            upstream,
            start_time: Instant::now(),
        })
    }
}

/// Permissive cross-origin policy; `*` allows every origin
pub fn cors_layer(config: &ProxyConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allow_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build the full application router
pub fn app(config: &ProxyConfig) -> Result<Router> {
    let state = Arc::new(AppState::new(config)?);

    Ok(Router::new()
        .merge(routes::health_routes())
        .fallback(routes::proxy)
        .with_state(state)
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http()))
}

/// Run the HTTP server until Ctrl-C or SIGTERM
pub async fn run(config: ProxyConfig) -> Result<()> {
    let app = app(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!("  Listening on http://{}", listener.local_addr()?);
    info!(
        "  Forwarding {} -> {}{}",
        config.prefix, config.upstream, config.upstream_prefix
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
