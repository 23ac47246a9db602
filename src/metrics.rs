/// Metrics and telemetry for the license panel
///
/// Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - License verifications and mutations
/// - Login attempts
/// - Background job execution

use axum::{extract::{MatchedPath, Request}, middleware::Next, response::Response};
use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder,
    Gauge, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    // ========== License Metrics ==========

    /// Verification lookups by outcome
    pub static ref LICENSE_VERIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "license_verifications_total",
        "Total number of license verification requests",
        &["outcome"]
    )
    .unwrap();

    /// License mutations by operation
    pub static ref LICENSE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "license_operations_total",
        "Total number of license create/update/delete operations",
        &["operation"]
    )
    .unwrap();

    // ========== Account Metrics ==========

    /// Login attempts by result
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "login_attempts_total",
        "Total number of login attempts",
        &["result"]
    )
    .unwrap();

    /// Requests turned away by a service flag
    pub static ref SERVICE_DENIALS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "service_denials_total",
        "Total number of requests denied for a missing service flag",
        &["service"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a verification outcome (`valid`, `inactive`, `unknown`, `missing`)
pub fn record_license_verification(outcome: &str) {
    LICENSE_VERIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a license mutation
pub fn record_license_operation(operation: &str) {
    LICENSE_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
}

/// Record a login attempt
pub fn record_login_attempt(success: bool) {
    LOGIN_ATTEMPTS_TOTAL
        .with_label_values(&[if success { "success" } else { "failure" }])
        .inc();
}

/// Record a service-flag denial
pub fn record_service_denial(service: &str) {
    SERVICE_DENIALS_TOTAL.with_label_values(&[service]).inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
}

/// Middleware recording count and latency of every request
///
/// Labels use the matched route template, so `/licensing/42/toggle/` and
/// `/licensing/43/toggle/` share one series.
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    HTTP_REQUESTS_ACTIVE.inc();
    let start = Instant::now();
    let response = next.run(request).await;
    HTTP_REQUESTS_ACTIVE.dec();

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
