//! Shared utilities for integration tests.

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use service_bootstrap::app::{AppContext, Application, LivenessApp};
use service_bootstrap::{HttpServer, ServerHandle, ServiceConfig};

/// Loopback, ephemeral port, short grace period.
#[allow(dead_code)]
pub fn local_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.shutdown.grace_period_secs = 5;
    config
}

/// Server for the built-in liveness application.
#[allow(dead_code)]
pub fn liveness_server(config: ServiceConfig) -> HttpServer {
    HttpServer::new(Arc::new(LivenessApp), config)
}

/// Application whose `/slow` handler sleeps, then reports readiness as seen
/// at the end of the request.
#[allow(dead_code)]
pub fn slow_app(delay: Duration) -> impl Application {
    move |ctx: &AppContext| {
        let health = ctx.health.clone();
        Router::new().route(
            "/slow",
            get(move || {
                let health = health.clone();
                async move {
                    tokio::time::sleep(delay).await;
                    if health.is_ready() {
                        "ready"
                    } else {
                        "draining"
                    }
                }
            }),
        )
    }
}

#[allow(dead_code)]
pub fn slow_server(delay: Duration, config: ServiceConfig) -> HttpServer {
    HttpServer::new(Arc::new(slow_app(delay)), config)
}

/// Wait until the server has accepted at least one connection.
#[allow(dead_code)]
pub async fn wait_until_active(handle: &ServerHandle) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.active_connections() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("server never accepted the connection");
}

/// Client without pooling or proxies so each request opens its own connection.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
