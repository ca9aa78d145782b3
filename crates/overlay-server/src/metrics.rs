//! Prometheus metrics for the override server.
//!
//! - Resolution cache hits (per tier) and misses
//! - Override store queries and failures
//! - Resolution latency

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    // Cache metrics
    pub const CACHE_HITS_TOTAL: &str = "overlay_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "overlay_cache_misses_total";

    // Resolution metrics
    pub const STORE_QUERIES_TOTAL: &str = "overlay_store_queries_total";
    pub const RESOLUTION_FAILURES_TOTAL: &str = "overlay_resolution_failures_total";
    pub const RESOLUTION_DURATION_SECONDS: &str = "overlay_resolution_duration_seconds";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics is served by the router.
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

pub fn record_cache_hit(tier: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
}

pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record a store query, labelled by outcome.
pub fn record_store_query(backend: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(
        names::STORE_QUERIES_TOTAL,
        "backend" => backend,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_resolution_failure() {
    counter!(names::RESOLUTION_FAILURES_TOTAL).increment(1);
}

/// Record how long a resolution took and where the answer came from.
pub fn record_resolution_duration(source: &'static str, duration: Duration) {
    histogram!(names::RESOLUTION_DURATION_SECONDS, "source" => source)
        .record(duration.as_secs_f64());
}
