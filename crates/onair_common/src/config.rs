//! Configuration for the relay daemon and the frontend.
//!
//! Loads settings from `$ONAIR_CONFIG`, then /etc/onair/config.toml, or uses
//! defaults. Every field has a default so partial files are fine.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/onair/config.toml";

/// Environment variable overriding the config path
pub const CONFIG_ENV: &str = "ONAIR_CONFIG";

/// Reverse proxy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Socket address to listen on
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Local path prefix that is forwarded
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Upstream origin (scheme and host)
    #[serde(default = "default_upstream")]
    pub upstream: String,

    /// Path prefix the local prefix is rewritten to
    #[serde(default = "default_upstream_prefix")]
    pub upstream_prefix: String,

    /// Allowed CORS origins; `*` allows any
    #[serde(default = "default_allow_origins")]
    pub allow_origins: Vec<String>,

    /// Largest request body forwarded upstream
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Upstream request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_prefix() -> String {
    "/api".to_string()
}

fn default_upstream() -> String {
    "https://onair.radioapi.io".to_string()
}

fn default_upstream_prefix() -> String {
    "/thisisgo/go".to_string()
}

fn default_allow_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_upstream_timeout() -> u64 {
    30
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            prefix: default_prefix(),
            upstream: default_upstream(),
            upstream_prefix: default_upstream_prefix(),
            allow_origins: default_allow_origins(),
            max_body_bytes: default_max_body_bytes(),
            upstream_timeout_secs: default_upstream_timeout(),
        }
    }
}

impl ProxyConfig {
    /// True when any origin may read responses
    pub fn allows_any_origin(&self) -> bool {
        self.allow_origins.iter().any(|o| o == "*")
    }
}

/// Frontend polling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Now-playing endpoint, normally served through the proxy
    #[serde(default = "default_poll_url")]
    pub url: String,

    /// Refresh period in milliseconds; 0 fetches once
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Keep the loading indicator hidden during refreshes
    #[serde(default)]
    pub suppress_loading: bool,

    /// HTTP timeout per attempt in seconds
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
}

fn default_poll_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_interval_ms() -> u64 {
    10_000
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            url: default_poll_url(),
            interval_ms: default_interval_ms(),
            suppress_loading: false,
            timeout_secs: default_poll_timeout(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub poller: PollerConfig,
}

impl Config {
    /// Load config from `$ONAIR_CONFIG` or the system path, falling back to
    /// defaults when no system file exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        let path = Path::new(CONFIG_PATH);
        if path.exists() {
            Self::load_from(path)
        } else {
            debug!("No config at {}, using defaults", CONFIG_PATH);
            Ok(Self::default())
        }
    }

    /// Load and validate a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(path),
            source,
        })?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject settings the proxy cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let proxy = &self.proxy;
        if proxy.prefix.is_empty() || !proxy.prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "proxy.prefix must start with '/': {:?}",
                proxy.prefix
            )));
        }
        if !proxy.upstream_prefix.is_empty() && !proxy.upstream_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "proxy.upstream_prefix must be empty or start with '/': {:?}",
                proxy.upstream_prefix
            )));
        }
        if !(proxy.upstream.starts_with("http://") || proxy.upstream.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "proxy.upstream must be an http(s) origin: {:?}",
                proxy.upstream
            )));
        }
        if proxy.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "proxy.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
