//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fileserver_requests_total` (counter): requests by method, status
//! - `fileserver_request_duration_seconds` (histogram): latency distribution
//! - `fileserver_rate_limited_total` (counter): requests answered with 429
//! - `fileserver_access_log_errors_total` (counter): failed access log writes
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "fileserver_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("fileserver_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("fileserver_rate_limited_total").increment(1);
}

pub fn record_access_log_error() {
    counter!("fileserver_access_log_errors_total").increment(1);
}
