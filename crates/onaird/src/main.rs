//! OnAir Daemon - now-playing reverse proxy
//!
//! Forwards browser requests to the radio metadata API and relaxes
//! cross-origin restrictions on the way back.

use anyhow::{Context, Result};
use onair_common::Config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("[BOOT] OnAir Daemon v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        "[BOOT] Config loaded: upstream={}, origins={:?}",
        config.proxy.upstream, config.proxy.allow_origins
    );

    onaird::server::run(config.proxy).await
}
