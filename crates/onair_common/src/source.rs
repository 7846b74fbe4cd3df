//! Where a poller gets its data from.
//!
//! Production code uses [`HttpSource`], which issues a GET with `reqwest` and
//! decodes the JSON body. Tests plug in scripted sources instead.

use crate::error::FetchError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::time::Duration;

/// Default request timeout for [`HttpSource`]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One fetch of a typed resource
#[async_trait]
pub trait Source<T>: Send + Sync {
    /// Perform a single request and decode the body
    async fn fetch(&self) -> Result<T, FetchError>;

    /// Human-readable target, used in log lines
    fn describe(&self) -> String;
}

/// JSON over HTTP GET
pub struct HttpSource<T> {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    _body: PhantomData<fn() -> T>,
}

impl<T> HttpSource<T> {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
            _body: PhantomData,
        }
    }

    /// Create with custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = build_client(timeout);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("onair/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl<T> Source<T> for HttpSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch(&self) -> Result<T, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        let response = response.error_for_status()?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_creation() {
        let source: HttpSource<serde_json::Value> = HttpSource::new("http://127.0.0.1:3000/api");
        assert_eq!(source.url(), "http://127.0.0.1:3000/api");
        assert_eq!(source.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(source.describe(), "http://127.0.0.1:3000/api");
    }

    #[test]
    fn test_custom_timeout() {
        let source: HttpSource<serde_json::Value> =
            HttpSource::new("http://localhost").with_timeout(Duration::from_secs(5));
        assert_eq!(source.timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_malformed_url_is_a_fetch_failure() {
        let source: HttpSource<serde_json::Value> = HttpSource::new("not a url");
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Request(_)));
        assert!(!err.to_string().is_empty());
    }
}
