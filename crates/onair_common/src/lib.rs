//! OnAir Common - Shared types for the now-playing relay
//!
//! Payload types, the interval poller and configuration used by both the
//! proxy daemon and the terminal frontend.

pub mod config;
pub mod error;
pub mod poller;
pub mod source;
pub mod types;

pub use config::{Config, PollerConfig, ProxyConfig};
pub use error::{ConfigError, FetchError};
pub use poller::{FetchState, PollHandle, PollOptions, PollingFetcher};
pub use source::{HttpSource, Source};
pub use types::{NowPlayingData, NowPlayingItem, TrackStatus};
