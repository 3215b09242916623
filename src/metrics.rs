//! Prometheus metrics for indexing, search and the gateway

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

/// Write-side metrics
pub struct IndexMetrics {
    /// Tasks committed
    pub tasks_applied: IntCounterVec,

    /// Tasks whose commit failed
    pub tasks_failed: IntCounterVec,

    /// Documents added, updated or deleted
    pub documents_written: IntCounterVec,

    /// Time spent applying one task
    pub apply_duration: HistogramVec,

    /// Pending tasks seen by the last consumer cycle
    pub queue_length: IntGauge,
}

/// Read-side metrics
pub struct SearchMetrics {
    /// Searches served
    pub searches: IntCounterVec,

    pub cache_hits: IntCounter,

    pub cache_misses: IntCounter,

    /// Search latency
    pub latency: HistogramVec,
}

/// Gateway metrics
pub struct GatewayMetrics {
    /// Requests by resolved action and status
    pub requests: IntCounterVec,
}

lazy_static! {
    pub static ref INDEX_METRICS: IndexMetrics = IndexMetrics {
        tasks_applied: register_int_counter_vec!(
            "forge_search_tasks_applied_total",
            "Total number of tasks committed to an index",
            &["type", "action"]
        )
        .expect("tasks_applied metric"),

        tasks_failed: register_int_counter_vec!(
            "forge_search_tasks_failed_total",
            "Total number of tasks that failed to commit",
            &["type", "action"]
        )
        .expect("tasks_failed metric"),

        documents_written: register_int_counter_vec!(
            "forge_search_documents_written_total",
            "Total number of documents written",
            &["type", "action"]
        )
        .expect("documents_written metric"),

        apply_duration: register_histogram_vec!(
            "forge_search_task_apply_seconds",
            "Time spent applying one task in seconds",
            &["type"]
        )
        .expect("apply_duration metric"),

        queue_length: register_int_gauge!(
            "forge_search_queue_length",
            "Pending tasks in the queue"
        )
        .expect("queue_length metric"),
    };

    pub static ref SEARCH_METRICS: SearchMetrics = SearchMetrics {
        searches: register_int_counter_vec!(
            "forge_search_searches_total",
            "Total number of searches served",
            &["type", "mode"]
        )
        .expect("searches metric"),

        cache_hits: register_int_counter!(
            "forge_search_query_cache_hits_total",
            "Query cache hits"
        )
        .expect("cache_hits metric"),

        cache_misses: register_int_counter!(
            "forge_search_query_cache_misses_total",
            "Query cache misses"
        )
        .expect("cache_misses metric"),

        latency: register_histogram_vec!(
            "forge_search_search_latency_seconds",
            "Search latency in seconds",
            &["type"]
        )
        .expect("latency metric"),
    };

    pub static ref GATEWAY_METRICS: GatewayMetrics = GatewayMetrics {
        requests: register_int_counter_vec!(
            "forge_search_gateway_requests_total",
            "Total number of gateway requests",
            &["group", "operation", "status"]
        )
        .expect("requests metric"),
    };
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
