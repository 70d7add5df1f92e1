//! Observability module providing logging and metrics.

use reqwest::header::HeaderMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Metrics collector for Cloud Foundry API operations.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total requests made, replays included.
    requests_total: AtomicU64,
    /// Successful requests.
    requests_success: AtomicU64,
    /// Failed requests.
    requests_failed: AtomicU64,
    /// Requests rejected with 401 and replayed with a fresh token.
    requests_replayed: AtomicU64,
    /// Pages fetched by paginators.
    pages_fetched: AtomicU64,
    /// Total request latency in microseconds.
    latency_total_us: AtomicU64,
    /// Request count for latency calculation.
    latency_count: AtomicU64,
}

impl Metrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request.
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful request.
    pub fn record_success(&self) {
        self.requests_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed request.
    pub fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a replay after an authentication rejection.
    pub fn record_replay(&self) {
        self.requests_replayed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a fetched page.
    pub fn record_page(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    /// Records request latency.
    pub fn record_latency(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.latency_total_us.fetch_add(us, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the total request count.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Gets the successful request count.
    pub fn successful_requests(&self) -> u64 {
        self.requests_success.load(Ordering::Relaxed)
    }

    /// Gets the failed request count.
    pub fn failed_requests(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    /// Gets the replayed request count.
    pub fn replayed_requests(&self) -> u64 {
        self.requests_replayed.load(Ordering::Relaxed)
    }

    /// Gets the fetched page count.
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    /// Gets the average latency in microseconds.
    pub fn average_latency_us(&self) -> u64 {
        let total = self.latency_total_us.load(Ordering::Relaxed);
        let count = self.latency_count.load(Ordering::Relaxed);
        if count == 0 {
            0
        } else {
            total / count
        }
    }

    /// Gets a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.total_requests(),
            requests_success: self.successful_requests(),
            requests_failed: self.failed_requests(),
            requests_replayed: self.replayed_requests(),
            pages_fetched: self.pages_fetched(),
            average_latency_us: self.average_latency_us(),
        }
    }

    /// Resets all metrics.
    pub fn reset(&self) {
        self.requests_total.store(0, Ordering::Relaxed);
        self.requests_success.store(0, Ordering::Relaxed);
        self.requests_failed.store(0, Ordering::Relaxed);
        self.requests_replayed.store(0, Ordering::Relaxed);
        self.pages_fetched.store(0, Ordering::Relaxed);
        self.latency_total_us.store(0, Ordering::Relaxed);
        self.latency_count.store(0, Ordering::Relaxed);
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total requests.
    pub requests_total: u64,
    /// Successful requests.
    pub requests_success: u64,
    /// Failed requests.
    pub requests_failed: u64,
    /// Requests replayed after a token refresh.
    pub requests_replayed: u64,
    /// Pages fetched.
    pub pages_fetched: u64,
    /// Average latency in microseconds.
    pub average_latency_us: u64,
}

/// Request timer for measuring latency.
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<Metrics>,
}

impl RequestTimer {
    /// Creates a new request timer.
    pub fn new(metrics: Arc<Metrics>) -> Self {
        metrics.record_request();
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    /// Records success and latency.
    pub fn success(self) {
        self.metrics.record_success();
        self.metrics.record_latency(self.start.elapsed());
    }

    /// Records failure and latency.
    pub fn failure(self) {
        self.metrics.record_failure();
        self.metrics.record_latency(self.start.elapsed());
    }

    /// Gets elapsed time without recording.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Tracing hooks for Cloud Foundry API operations.
pub struct TracingHooks;

impl TracingHooks {
    /// Logs the start of an API request. Sensitive header values are
    /// redacted.
    #[instrument(skip(method, url, headers))]
    pub fn on_request_start(method: &str, url: &str, headers: &HeaderMap) {
        debug!(
            method = %method,
            url = %url,
            headers = %redacted_headers(headers),
            "Cloud Foundry API request started"
        );
    }

    /// Logs the completion of an API request.
    #[instrument(skip(method, url, status, duration))]
    pub fn on_request_complete(method: &str, url: &str, status: u16, duration: Duration) {
        info!(
            method = %method,
            url = %url,
            status = status,
            duration_ms = duration.as_millis() as u64,
            "Cloud Foundry API request completed"
        );
    }

    /// Logs a request error.
    #[instrument(skip(method, url, error))]
    pub fn on_request_error(method: &str, url: &str, error: &str) {
        error!(
            method = %method,
            url = %url,
            error = %error,
            "Cloud Foundry API request failed"
        );
    }

    /// Logs a 401 that triggers a token refresh and replay.
    #[instrument(skip(method, url))]
    pub fn on_auth_rejected(method: &str, url: &str, replaying: bool) {
        if replaying {
            warn!(
                method = %method,
                url = %url,
                "Bearer token rejected, refreshing and replaying"
            );
        } else {
            warn!(
                method = %method,
                url = %url,
                "Bearer token rejected after refresh"
            );
        }
    }

    /// Logs authentication token refresh.
    #[instrument]
    pub fn on_auth_token_refresh() {
        info!("Authentication token refreshed");
    }

    /// Logs a failed token fetch.
    #[instrument(skip(error))]
    pub fn on_auth_token_error(error: &str) {
        warn!(error = %error, "Authentication token fetch failed");
    }

    /// Logs a fetched page.
    #[instrument(skip(url, resources))]
    pub fn on_page_fetched(url: &str, resources: usize, has_next: bool) {
        debug!(
            url = %url,
            resources = resources,
            has_next = has_next,
            "Page fetched"
        );
    }

    /// Logs a job status read.
    #[instrument(skip(job_id, state))]
    pub fn on_job_status(job_id: &str, state: &str) {
        debug!(
            job_id = %job_id,
            state = %state,
            "Job status read"
        );
    }
}

/// Sensitive headers that should be redacted in logs.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
];

/// Redacts sensitive values in headers.
pub fn redact_header(name: &str, value: &str) -> String {
    if SENSITIVE_HEADERS.contains(&name.to_lowercase().as_str()) {
        "[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}

/// Renders headers as `name: value` pairs with sensitive values redacted.
pub fn redacted_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("[binary]");
            format!("{}: {}", name, redact_header(name.as_str(), value))
        })
        .collect::<Vec<_>>()
        .join(", ")
}
