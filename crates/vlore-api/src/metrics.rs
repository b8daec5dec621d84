//! Prometheus metrics wiring.

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Count requests and record latency per method/path/status.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    let labels = [
        ("method", method),
        ("path", path),
        ("status", status),
    ];
    metrics::counter!("vlore_http_requests_total", &labels).increment(1);
    metrics::histogram!("vlore_http_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());

    response
}
