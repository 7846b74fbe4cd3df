//! Reverse proxy to the now-playing API.
//!
//! Everything under the local prefix is forwarded to the upstream origin with
//! the prefix swapped for the upstream prefix. Method, headers, query and body
//! pass through; hop-by-hop headers do not. The upstream body is streamed back.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use onair_common::ProxyConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// Headers that describe a single connection and are never forwarded
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwarding errors, each mapped to a gateway status
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No route for {0}")]
    NotProxied(String),

    #[error("Request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("Unsupported method: {0}")]
    Method(String),

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid upstream response: {0}")]
    BadResponse(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NotProxied(_) => StatusCode::NOT_FOUND,
            ProxyError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Method(_) => StatusCode::BAD_REQUEST,
            ProxyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Unreachable(_) | ProxyError::BadResponse(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Rewrite a request path for the upstream.
///
/// `prefix` only matches on a segment boundary, so `/api` covers `/api` and
/// `/api/x` but not `/apix`. Returns `None` for paths outside the prefix.
pub fn rewrite_path(prefix: &str, upstream_prefix: &str, path_and_query: &str) -> Option<String> {
    let (path, query) = match path_and_query.find('?') {
        Some(i) => path_and_query.split_at(i),
        None => (path_and_query, ""),
    };

    let rest = path.strip_prefix(prefix.trim_end_matches('/'))?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let mut rewritten = format!("{}{}", upstream_prefix.trim_end_matches('/'), rest);
    if rewritten.is_empty() {
        rewritten.push('/');
    }
    rewritten.push_str(query);
    Some(rewritten)
}

/// True for headers that must not cross the proxy.
///
/// Besides the fixed list, any header named in the `Connection` header is
/// connection-scoped too.
fn is_hop_by_hop(name: &str, connection_tokens: &[String]) -> bool {
    HOP_BY_HOP.contains(&name) || connection_tokens.iter().any(|t| t == name)
}

fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    parse_connection(headers.get_all("connection").iter().map(|v| v.as_bytes()))
}

fn parse_connection<'a>(values: impl Iterator<Item = &'a [u8]>) -> Vec<String> {
    values
        .filter_map(|v| std::str::from_utf8(v).ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Fixed upstream target plus the client used to reach it
pub struct Upstream {
    client: reqwest::Client,
    origin: String,
    prefix: String,
    upstream_prefix: String,
    max_body_bytes: usize,
}

impl Upstream {
    pub fn new(config: &ProxyConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            origin: config.upstream.trim_end_matches('/').to_string(),
            prefix: config.prefix.clone(),
            upstream_prefix: config.upstream_prefix.clone(),
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Human-readable rewrite rule for logs and the health endpoint
    pub fn describe(&self) -> String {
        format!("{} -> {}{}", self.prefix, self.origin, self.upstream_prefix)
    }

    /// Upstream URL for a local path, if it falls under the prefix
    pub fn target_url(&self, path_and_query: &str) -> Option<String> {
        rewrite_path(&self.prefix, &self.upstream_prefix, path_and_query)
            .map(|path| format!("{}{}", self.origin, path))
    }

    /// Forward one request and stream the upstream response back
    pub async fn forward(&self, request: Request) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let url = self
            .target_url(path_and_query)
            .ok_or_else(|| ProxyError::NotProxied(parts.uri.path().to_string()))?;

        let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
            .map_err(|_| ProxyError::Method(parts.method.to_string()))?;

        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|_| ProxyError::BodyTooLarge(self.max_body_bytes))?;

        // Host is dropped so the client sets the upstream host
        let tokens = connection_tokens(&parts.headers);
        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in parts.headers.iter() {
            if name == "host" || is_hop_by_hop(name.as_str(), &tokens) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
                reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.append(name, value);
            }
        }

        debug!("Forwarding {} {} -> {}", parts.method, path_and_query, url);

        let upstream = self
            .client
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProxyError::Timeout
                } else {
                    ProxyError::Unreachable(e.to_string())
                }
            })?;

        let status = StatusCode::from_u16(upstream.status().as_u16())
            .map_err(|e| ProxyError::BadResponse(e.to_string()))?;

        let upstream_tokens = parse_connection(
            upstream
                .headers()
                .get_all("connection")
                .iter()
                .map(|v| v.as_bytes()),
        );

        // Upstream CORS headers are replaced by our own policy
        let mut builder = Response::builder().status(status);
        for (name, value) in upstream.headers().iter() {
            let name = name.as_str();
            if is_hop_by_hop(name, &upstream_tokens) || name.starts_with("access-control-") {
                continue;
            }
            builder = builder.header(name, value.as_bytes());
        }

        builder
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| ProxyError::BadResponse(e.to_string()))
    }
}

/// Log and convert a forwarding failure
pub fn failure_response(err: ProxyError) -> Response {
    match &err {
        ProxyError::NotProxied(_) => debug!("{}", err),
        _ => warn!("Proxy error: {}", err),
    }
    err.into_response()
}
