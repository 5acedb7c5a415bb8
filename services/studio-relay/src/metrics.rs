//! Prometheus metrics exposition
//!
//! - `relay_requests_total` (counter): labels `action`, `status`
//! - `relay_request_duration_seconds` (histogram): label `action`
//!
//! `rotation_attempts_total` (labelled by `outcome`) is recorded inside the
//! credential-pool crate and renders through the same handle.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
];

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Generation calls can run well past a minute when pacing delays stack up
/// across a batch, so the buckets extend to 120s. The handle's `render()`
/// produces the text exposition format for the `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "relay_request_duration_seconds".to_string(),
            ),
            DURATION_BUCKETS,
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed workflow request with action and status labels.
pub fn record_request(action: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "relay_requests_total",
        "action" => action.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    metrics::histogram!("relay_request_duration_seconds", "action" => action.to_string())
        .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_is_noop_without_recorder() {
        record_request("cleanup", 200, 0.05);
    }

    /// Isolated recorder/handle pair; only one global recorder may exist per
    /// process, so tests install a local one instead.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Full(
                    "relay_request_duration_seconds".to_string(),
                ),
                DURATION_BUCKETS,
            )
            .expect("failed to set histogram buckets")
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_request_increments_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("redesign", 200, 4.2);
        record_request("cleanup", 429, 0.3);

        let output = handle.render();
        assert!(output.contains("relay_requests_total"));
        assert!(output.contains("action=\"redesign\""));
        assert!(output.contains("status=\"200\""));
        assert!(output.contains("action=\"cleanup\""));
        assert!(output.contains("status=\"429\""));
        assert!(
            output.contains("relay_request_duration_seconds_bucket"),
            "histogram must render _bucket lines"
        );
    }

    #[test]
    fn buckets_cover_long_batches() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("redesign", 200, 95.0);

        let output = handle.render();
        assert!(output.contains("le=\"120\""), "120s bucket must exist");
        assert!(output.contains("le=\"+Inf\""));
    }
}
