use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Store Metrics
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "store_operations_total",
        "Total number of persistence operations",
        &["operation", "store", "status"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "store_operation_duration_seconds",
        "Persistence operation duration in seconds",
        &["operation", "store"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Text generation Metrics
    pub static ref LLM_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "llm_requests_total",
        "Total number of text-generation requests",
        &["kind", "status"]
    )
    .unwrap();

    pub static ref LLM_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "llm_request_duration_seconds",
        "Text-generation request duration in seconds",
        &["kind"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref INTERVIEWS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "interviews_total",
        "Total number of interviews by lifecycle step",
        &["status"]
    )
    .unwrap();

    pub static ref INTERVIEWS_ACTIVE: IntGauge = register_int_gauge!(
        "interviews_active",
        "Number of interviews currently running a countdown"
    )
    .unwrap();

    pub static ref CANDIDATE_TURNS_TOTAL: IntCounter = register_int_counter!(
        "candidate_turns_total",
        "Total number of candidate turns appended"
    )
    .unwrap();

    pub static ref EVALUATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "evaluations_total",
        "Total number of evaluation attempts by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref SSE_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sse_connections_active",
        "Number of active SSE connections"
    )
    .unwrap();

    pub static ref STATS_WORKER_TICKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "stats_worker_ticks_total",
        "Total number of stats worker ticks",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track a persistence operation with metrics
pub async fn track_store_operation<F, T>(
    operation: &str,
    store: &str,
    future: F,
) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, store, status])
        .inc();

    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, store])
        .observe(duration);

    result
}

/// Helper: track a text-generation call with metrics
pub async fn track_llm_request<F, T, E>(kind: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    LLM_REQUESTS_TOTAL.with_label_values(&[kind, status]).inc();
    LLM_REQUEST_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = EVALUATIONS_TOTAL.with_label_values(&["valid"]).get();
    }

    #[test]
    fn test_render_metrics() {
        INTERVIEWS_TOTAL.with_label_values(&["created"]).inc();

        let result = render_metrics();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("interviews_total"));
    }

    #[tokio::test]
    async fn test_track_llm_request_counts_failures() {
        let before = LLM_REQUESTS_TOTAL
            .with_label_values(&["metrics_test", "error"])
            .get();
        let result: Result<(), &str> = track_llm_request("metrics_test", async { Err("boom") }).await;
        assert!(result.is_err());
        let after = LLM_REQUESTS_TOTAL
            .with_label_values(&["metrics_test", "error"])
            .get();
        assert_eq!(after, before + 1);
    }
}
