//! Command implementations for onairctl

use crate::render::Renderer;
use anyhow::{Context, Result};
use chrono::Local;
use onair_common::{FetchState, HttpSource, NowPlayingData, PollHandle, PollOptions, PollingFetcher};
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Exit code when the data was fetched
pub const EXIT_SUCCESS: u8 = 0;

/// Exit code when the fetch failed
pub const EXIT_FETCH_FAILED: u8 = 1;

/// Resolved polling settings (config file merged with flags)
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub url: String,
    pub interval_ms: Option<u64>,
    pub suppress_loading: bool,
    pub timeout: Duration,
}

impl PollSettings {
    fn start(&self) -> PollHandle<NowPlayingData> {
        let source = HttpSource::new(self.url.clone()).with_timeout(self.timeout);
        PollingFetcher::new(source)
            .with_options(PollOptions::from_millis(self.interval_ms, self.suppress_loading))
            .start()
    }
}

/// Poll and print every change until Ctrl-C
pub async fn watch(settings: PollSettings, renderer: Renderer) -> Result<u8> {
    let mut handle = settings.start();
    let mut rx = handle.subscribe();
    let mut last = String::new();

    let initial = rx.borrow_and_update().clone();
    print_changed(&initial, renderer, &mut last)?;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                print_changed(&snapshot, renderer, &mut last)?;
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Ctrl-C received");
                break;
            }
        }
    }

    handle.stop();
    Ok(EXIT_SUCCESS)
}

fn print_changed(
    state: &FetchState<NowPlayingData>,
    renderer: Renderer,
    last: &mut String,
) -> Result<()> {
    // The timestamp is left out of the comparison so only content changes print
    let content = renderer.render(state, Local::now());
    let key = strip_stamps(&content);
    if key == *last {
        return Ok(());
    }
    *last = key;

    let mut stdout = io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn strip_stamps(rendered: &str) -> String {
    rendered
        .lines()
        .map(|line| match line.strip_prefix('[') {
            Some(rest) => rest.split_once("] ").map_or(line, |(_, tail)| tail),
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fetch once and print the result
pub async fn once(settings: PollSettings, renderer: Renderer, json: bool) -> Result<u8> {
    let settings = PollSettings {
        interval_ms: None,
        ..settings
    };
    let handle = settings.start();
    let mut rx = handle.subscribe();

    let state = settle(&mut rx).await?;

    if let Some(error) = &state.error {
        eprint!("{}", renderer.render(&state, Local::now()));
        debug!("Fetch failed: {}", error);
        return Ok(EXIT_FETCH_FAILED);
    }

    if json {
        let data = state.data.as_deref().context("Fetch settled without data")?;
        println!("{}", serde_json::to_string_pretty(data)?);
    } else {
        print!("{}", renderer.render(&state, Local::now()));
    }
    Ok(EXIT_SUCCESS)
}

/// Wait until the single attempt has landed
async fn settle(
    rx: &mut watch::Receiver<FetchState<NowPlayingData>>,
) -> Result<FetchState<NowPlayingData>> {
    let state = rx
        .wait_for(|s| !s.loading && (s.data.is_some() || s.error.is_some()))
        .await
        .context("Poller stopped before the fetch completed")?;
    Ok(state.clone())
}
