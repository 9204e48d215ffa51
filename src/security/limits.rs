//! Request limits.
//!
//! Oversized bodies are rejected with 413 Payload Too Large, before the
//! handler reads them when `content-length` is known.

use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::LimitsConfig;

pub fn apply(router: Router, limits: &LimitsConfig) -> Router {
    router.layer(RequestBodyLimitLayer::new(limits.max_body_size))
}
