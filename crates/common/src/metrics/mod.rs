//! Metrics for the retrieval pipeline
//!
//! Emits through the `metrics` facade; without an installed recorder every
//! call is a no-op, so embedding applications decide where metrics go.

use metrics::{counter, describe_counter, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all ragforge metrics
pub const METRICS_PREFIX: &str = "ragforge";

/// Buckets for search latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for embedding latency (typically slower)
pub const EMBEDDING_BUCKETS: &[f64] = &[
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.000, // 2s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search pipeline runs"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search pipeline latency in seconds"
    );

    describe_counter!(
        format!("{}_index_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total indexing calls"
    );

    describe_counter!(
        format!("{}_documents_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents (or child chunks) indexed"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_backend_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Vector store and lexical index failures caught during search"
    );

    describe_counter!(
        format!("{}_degradations_total", METRICS_PREFIX),
        Unit::Count,
        "Pipeline stages skipped because a collaborator was unavailable"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record search metrics
pub fn record_search(duration_secs: f64, mode: &str, result_count: usize) {
    counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .set(result_count as f64);
}

/// Helper to record an indexing run
pub fn record_index(duration_secs: f64, documents: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_index_runs_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    if success {
        counter!(format!("{}_documents_indexed_total", METRICS_PREFIX)).increment(documents as u64);
    }

    histogram!(format!("{}_index_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);

        histogram!(
            format!("{}_embedding_batch_size", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(batch_size as f64);
    }
}

/// Helper to record a backend failure that was absorbed by the pipeline
pub fn record_backend_failure(source: &'static str) {
    counter!(
        format!("{}_backend_failures_total", METRICS_PREFIX),
        "source" => source
    )
    .increment(1);
}

/// Helper to record a skipped stage (expansion, rerank, answer)
pub fn record_degradation(stage: &'static str) {
    counter!(
        format!("{}_degradations_total", METRICS_PREFIX),
        "stage" => stage
    )
    .increment(1);
}
