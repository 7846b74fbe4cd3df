//! Proxy behaviour against a local echo upstream

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode, Uri},
    response::IntoResponse,
    routing::any,
    Json, Router,
};
use http_body_util::BodyExt;
use onair_common::ProxyConfig;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    if uri.path().ends_with("/slow") {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    (
        [
            ("access-control-allow-origin", "https://upstream.example"),
            ("x-upstream", "yes"),
        ],
        Json(json!({
            "method": method.as_str(),
            "path": uri.path(),
            "query": uri.query(),
            "host": header("host"),
            "x_custom": header("x-custom"),
            "x_session": header("x-session"),
            "body": String::from_utf8_lossy(&body),
        })),
    )
}

/// Start the echo upstream, returning its `host:port`
async fn spawn_upstream() -> String {
    let app = Router::new()
        .route("/thisisgo/go", any(echo))
        .route("/thisisgo/go/*rest", any(echo));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr.to_string()
}

fn config_for(authority: &str) -> ProxyConfig {
    ProxyConfig {
        upstream: format!("http://{}", authority),
        ..ProxyConfig::default()
    }
}

async fn send(config: &ProxyConfig, request: Request<Body>) -> axum::response::Response {
    let app = onaird::server::app(config).unwrap();
    app.oneshot(request).await.unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let config = ProxyConfig::default();
    let response = send(
        &config,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["upstream"], "/api -> https://onair.radioapi.io/thisisgo/go");
}

#[tokio::test]
async fn test_forward_rewrites_path_and_query() {
    let authority = spawn_upstream().await;
    let config = config_for(&authority);

    let response = send(
        &config,
        Request::builder()
            .uri("/api/station/7?format=json")
            .header("origin", "https://radio.example")
            .header("x-custom", "abc")
            .header("host", "localhost:3000")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers["x-upstream"], "yes");
    // Our policy replaces the upstream's
    let origins: Vec<_> = headers.get_all("access-control-allow-origin").iter().collect();
    assert_eq!(origins, vec!["*"]);

    let body = json_body(response).await;
    assert_eq!(body["method"], "GET");
    assert_eq!(body["path"], "/thisisgo/go/station/7");
    assert_eq!(body["query"], "format=json");
    assert_eq!(body["host"], authority.as_str());
    assert_eq!(body["x_custom"], "abc");
}

#[tokio::test]
async fn test_forward_method_and_body() {
    let authority = spawn_upstream().await;
    let config = config_for(&authority);

    let response = send(
        &config,
        Request::builder()
            .method("POST")
            .uri("/api")
            .body(Body::from("hello upstream"))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["method"], "POST");
    assert_eq!(body["path"], "/thisisgo/go");
    assert_eq!(body["body"], "hello upstream");
}

#[tokio::test]
async fn test_connection_scoped_headers_dropped() {
    let authority = spawn_upstream().await;
    let config = config_for(&authority);

    let response = send(
        &config,
        Request::builder()
            .uri("/api/now")
            .header("connection", "x-session")
            .header("x-session", "secret")
            .header("x-custom", "kept")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    let body = json_body(response).await;
    assert_eq!(body["x_session"], "");
    assert_eq!(body["x_custom"], "kept");
}

#[tokio::test]
async fn test_path_outside_prefix() {
    let config = ProxyConfig::default();
    let response = send(
        &config,
        Request::builder().uri("/apix/now").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preflight_allows_any_origin() {
    let config = ProxyConfig::default();
    let response = send(
        &config,
        Request::builder()
            .method("OPTIONS")
            .uri("/api")
            .header("origin", "https://radio.example")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert!(response.status().is_success());
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_restricted_origins() {
    let authority = spawn_upstream().await;
    let config = ProxyConfig {
        allow_origins: vec!["https://radio.example".to_string()],
        ..config_for(&authority)
    };

    let allowed = send(
        &config,
        Request::builder()
            .uri("/api")
            .header("origin", "https://radio.example")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "https://radio.example"
    );

    let denied = send(
        &config,
        Request::builder()
            .uri("/api")
            .header("origin", "https://other.example")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert!(denied.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_upstream_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let authority = listener.local_addr().unwrap().to_string();
    drop(listener);

    let response = send(
        &config_for(&authority),
        Request::builder().uri("/api").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_upstream_timeout() {
    let authority = spawn_upstream().await;
    let config = ProxyConfig {
        upstream_timeout_secs: 1,
        ..config_for(&authority)
    };

    let response = send(
        &config,
        Request::builder().uri("/api/slow").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_body_too_large() {
    let authority = spawn_upstream().await;
    let config = ProxyConfig {
        max_body_bytes: 4,
        ..config_for(&authority)
    };

    let response = send(
        &config,
        Request::builder()
            .method("POST")
            .uri("/api")
            .body(Body::from("far more than four bytes"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
