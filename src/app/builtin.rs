//! Built-in application served at `main:app`.
//!
//! Answers liveness and readiness probes and describes itself at `/`.

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::app::{AppContext, Application};

/// Liveness/readiness application.
#[derive(Debug, Clone, Copy, Default)]
pub struct LivenessApp;

impl Application for LivenessApp {
    fn router(&self, ctx: &AppContext) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/healthz", get(healthz))
            .route("/readyz", get(readyz))
            .fallback(not_found)
            .with_state(ctx.clone())
    }
}

async fn index(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!({
        "title": ctx.title,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
        "uptime_secs": ctx.health.uptime().as_secs(),
    }))
}

/// Liveness probe. Only proves the process can answer HTTP.
async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(ctx): State<AppContext>) -> impl IntoResponse {
    if ctx.health.is_ready() {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "draining" })),
        )
    }
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not found", "path": uri.path() })),
    )
}
