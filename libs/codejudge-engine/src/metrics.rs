// Prometheus metrics for the judging pipeline and the problem cache

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};

lazy_static! {
    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "codejudge_submissions_total",
        "Finished submissions by verdict",
        &["verdict"]
    )
    .expect("submissions counter can be registered");
    pub static ref TEST_EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "codejudge_test_executions_total",
        "Test case executions by outcome",
        &["outcome"]
    )
    .expect("test execution counter can be registered");
    pub static ref CACHE_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "codejudge_cache_lookups_total",
        "Problem cache lookups by key kind and result",
        &["kind", "result"]
    )
    .expect("cache lookup counter can be registered");
    pub static ref SUBMISSION_DURATION_SECONDS: Histogram = register_histogram!(
        "codejudge_submission_duration_seconds",
        "Wall-clock time from problem lookup to response"
    )
    .expect("submission histogram can be registered");
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_touched_metrics() {
        SUBMISSIONS_TOTAL.with_label_values(&["accepted"]).inc();
        CACHE_LOOKUPS_TOTAL.with_label_values(&["problem", "hit"]).inc();
        let text = render();
        assert!(text.contains("codejudge_submissions_total"));
        assert!(text.contains("codejudge_cache_lookups_total"));
    }
}
