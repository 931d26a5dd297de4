//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions
//! for ingestion, propagation, snapshot publication and queries.

use crate::errors::ErrorCode;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all Herald metrics
pub const METRICS_PREFIX: &str = "herald";

/// Histogram buckets for ranking query latency (in seconds)
pub const QUERY_BUCKETS: &[f64] = &[
    0.0001, // 100us
    0.0005, // 500us
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.500,  // 500ms
];

/// Buckets for propagation runs (whole-graph, much slower)
pub const PROPAGATION_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.010,  // 10ms
    0.100,  // 100ms
    0.500,  // 500ms
    1.000,  // 1s
    5.000,  // 5s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Ingestion metrics
    describe_counter!(
        format!("{}_articles_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Articles newly added to the citation graph"
    );

    describe_counter!(
        format!("{}_citations_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Citation edges newly added to the citation graph"
    );

    describe_counter!(
        format!("{}_ingestion_rejections_total", METRICS_PREFIX),
        Unit::Count,
        "Records or edges rejected at the ingestion boundary"
    );

    describe_gauge!(
        format!("{}_pending_citations", METRICS_PREFIX),
        Unit::Count,
        "Citations waiting for their target article"
    );

    // Propagation metrics
    describe_histogram!(
        format!("{}_propagation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Influence propagation latency in seconds"
    );

    describe_histogram!(
        format!("{}_propagation_iterations", METRICS_PREFIX),
        Unit::Count,
        "Iterations per propagation run"
    );

    describe_counter!(
        format!("{}_convergence_warnings_total", METRICS_PREFIX),
        Unit::Count,
        "Propagation runs that hit the iteration cap"
    );

    // Snapshot metrics
    describe_gauge!(
        format!("{}_snapshot_version", METRICS_PREFIX),
        Unit::Count,
        "Graph version of the published score snapshot"
    );

    describe_gauge!(
        format!("{}_snapshot_articles", METRICS_PREFIX),
        Unit::Count,
        "Articles in the published score snapshot"
    );

    describe_counter!(
        format!("{}_recomputations_abandoned_total", METRICS_PREFIX),
        Unit::Count,
        "Recomputations discarded because the graph advanced"
    );

    // Query metrics
    describe_counter!(
        format!("{}_rank_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of ranking queries"
    );

    describe_histogram!(
        format!("{}_rank_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Ranking query latency in seconds"
    );

    describe_gauge!(
        format!("{}_rank_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of results returned from the last ranking query"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record a graph insertion
pub fn record_ingestion(kind: &str) {
    let name = match kind {
        "citation" => format!("{}_citations_ingested_total", METRICS_PREFIX),
        _ => format!("{}_articles_ingested_total", METRICS_PREFIX),
    };
    counter!(name).increment(1);
}

/// Helper to record a rejected record or edge
pub fn record_rejection(code: ErrorCode) {
    counter!(
        format!("{}_ingestion_rejections_total", METRICS_PREFIX),
        "code" => code.as_label()
    )
    .increment(1);
}

/// Helper to record the pending citation buffer size
pub fn record_pending(count: usize) {
    gauge!(format!("{}_pending_citations", METRICS_PREFIX)).set(count as f64);
}

/// Helper to record a propagation run
pub fn record_propagation(duration_secs: f64, iterations: usize, converged: bool) {
    histogram!(format!("{}_propagation_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    histogram!(format!("{}_propagation_iterations", METRICS_PREFIX)).record(iterations as f64);

    if !converged {
        counter!(format!("{}_convergence_warnings_total", METRICS_PREFIX)).increment(1);
    }
}

/// Helper to record a published snapshot
pub fn record_snapshot(version: u64, articles: usize) {
    gauge!(format!("{}_snapshot_version", METRICS_PREFIX)).set(version as f64);
    gauge!(format!("{}_snapshot_articles", METRICS_PREFIX)).set(articles as f64);
}

/// Helper to record an abandoned recomputation
pub fn record_abandoned_recompute() {
    counter!(format!("{}_recomputations_abandoned_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record ranking query metrics
pub fn record_query(duration_secs: f64, result_count: usize) {
    counter!(format!("{}_rank_queries_total", METRICS_PREFIX)).increment(1);
    histogram!(format!("{}_rank_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    gauge!(format!("{}_rank_results_count", METRICS_PREFIX)).set(result_count as f64);
}
