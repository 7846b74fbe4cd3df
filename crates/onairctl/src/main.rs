//! OnAir Control - terminal now-playing display
//!
//! Polls the relay and prints what the station is playing.

use anyhow::Result;
use clap::{Parser, Subcommand};
use onair_common::Config;
use onairctl::commands::{self, PollSettings};
use onairctl::render::Renderer;
use std::process::ExitCode;
use std::time::Duration;

// Version is embedded at build time
const VERSION: &str = env!("ONAIR_VERSION");

#[derive(Parser)]
#[command(name = "onairctl")]
#[command(about = "OnAir - what is the station playing right now", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Log poller activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep polling and print every change
    Watch {
        /// Now-playing endpoint (defaults to the configured proxy)
        #[arg(long)]
        url: Option<String>,

        /// Refresh period in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Do not show the refresh indicator
        #[arg(long)]
        quiet_loading: bool,
    },

    /// Fetch once and exit
    Once {
        /// Now-playing endpoint (defaults to the configured proxy)
        #[arg(long)]
        url: Option<String>,

        /// Print the raw payload as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "error" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let config = Config::load()?;
    let renderer = Renderer::new(!cli.no_color);

    let code = match cli.command {
        Commands::Watch {
            url,
            interval_ms,
            quiet_loading,
        } => {
            let settings = PollSettings {
                url: url.unwrap_or(config.poller.url),
                interval_ms: Some(interval_ms.unwrap_or(config.poller.interval_ms)),
                suppress_loading: quiet_loading || config.poller.suppress_loading,
                timeout: Duration::from_secs(config.poller.timeout_secs),
            };
            commands::watch(settings, renderer).await?
        }
        Commands::Once { url, json } => {
            let settings = PollSettings {
                url: url.unwrap_or(config.poller.url),
                interval_ms: None,
                suppress_loading: true,
                timeout: Duration::from_secs(config.poller.timeout_secs),
            };
            commands::once(settings, renderer, json).await?
        }
    };

    Ok(ExitCode::from(code))
}
