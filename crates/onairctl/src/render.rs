//! Terminal rendering of the now-playing fetch state.

use chrono::{DateTime, Local};
use onair_common::{FetchState, NowPlayingData};
use owo_colors::OwoColorize;
use std::fmt::Write;

/// Number of history entries shown under the current track
pub const HISTORY_LINES: usize = 5;

/// Renders fetch state snapshots, with or without ANSI colors
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Render one snapshot as a block of lines stamped with `at`
    pub fn render(&self, state: &FetchState<NowPlayingData>, at: DateTime<Local>) -> String {
        let stamp = format!("[{}]", at.format("%H:%M:%S"));
        let mut out = String::new();

        if let Some(error) = &state.error {
            let line = format!("✗ {}", error);
            let _ = writeln!(out, "{} {}", stamp, self.paint_error(&line));
        } else if let Some(data) = &state.data {
            self.render_data(&mut out, &stamp, data);
        } else if !state.loading {
            let _ = writeln!(out, "{} no data yet", stamp);
        }

        if state.loading {
            let _ = writeln!(out, "{} {}", stamp, self.paint_dim("⟳ refreshing..."));
        }
        out
    }

    fn render_data(&self, out: &mut String, stamp: &str, data: &NowPlayingData) {
        if let Err(problem) = data.validate() {
            let _ = writeln!(out, "{} {}", stamp, self.paint_error(&format!("! {}", problem)));
        }

        match data.current() {
            Some(item) => {
                let track = format!("{} - {}", item.artist, item.title);
                let _ = writeln!(
                    out,
                    "{} ♪ Now playing: {} ({})",
                    stamp,
                    self.paint_track(&track),
                    item.duration
                );
            }
            None => {
                let _ = writeln!(out, "{} ♪ Nothing on air", stamp);
            }
        }

        let history: Vec<_> = data.history().take(HISTORY_LINES).collect();
        if !history.is_empty() {
            let indent = " ".repeat(stamp.len());
            let _ = writeln!(out, "{} Recently played:", indent);
            for item in history {
                let line = format!("{}  {} - {}", item.time, item.artist, item.title);
                let _ = writeln!(out, "{}   {}", indent, self.paint_dim(&line));
            }
        }
    }

    fn paint_error(&self, text: &str) -> String {
        if self.color {
            text.red().to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_track(&self, text: &str) -> String {
        if self.color {
            text.bold().green().to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_dim(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }
}
