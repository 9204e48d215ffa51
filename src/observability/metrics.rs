//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bootstrap_requests_total` (counter): requests by method, status
//! - `bootstrap_request_duration_seconds` (histogram): latency distribution
//! - `bootstrap_active_connections` (gauge): current connection count
//! - `bootstrap_connections_total` (counter): accepted connections
//! - `bootstrap_forced_closes_total` (counter): connections cut off at shutdown
//!
//! Recording is a no-op until a recorder is installed, so the helpers are
//! safe to call whether or not the exporter runs.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("bootstrap_requests_total", &labels).increment(1);
    histogram!("bootstrap_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn connection_opened() {
    counter!("bootstrap_connections_total").increment(1);
    gauge!("bootstrap_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("bootstrap_active_connections").decrement(1.0);
}

pub fn record_forced_closes(count: usize) {
    counter!("bootstrap_forced_closes_total").increment(count as u64);
}

/// Middleware recording request count and latency.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().as_str().to_owned();
    let response = next.run(request).await;
    record_request(&method, response.status().as_u16(), start);
    response
}
