//! HTTP routes for onaird
//!
//! `/health` is answered locally; every other path goes through the proxy
//! fallback, which returns 404 for paths outside the configured prefix.

use crate::proxy::failure_response;
use crate::server::AppState;
use axum::{
    extract::{Request, State},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type AppStateArc = Arc<AppState>;

/// Health endpoint payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub upstream: String,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        upstream: state.upstream.describe(),
    })
}

/// Catch-all handler forwarding to the upstream
pub async fn proxy(State(state): State<AppStateArc>, request: Request) -> Response {
    match state.upstream.forward(request).await {
        Ok(response) => response,
        Err(e) => failure_response(e),
    }
}
