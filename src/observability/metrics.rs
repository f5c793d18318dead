//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): responses by method and status
//! - `admission_rejected_total` (counter): rejected requests by reason
//! - `panics_recovered_total` (counter): recovered panics by scope
//! - `background_tasks_total` (counter): background tasks launched
//! - `background_tasks_completed_total` (counter): background tasks finished

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_exporter(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(error) => tracing::error!(%error, "failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_rejection(reason: &'static str) {
    metrics::counter!("admission_rejected_total", "reason" => reason).increment(1);
}

pub fn record_panic(scope: &'static str) {
    metrics::counter!("panics_recovered_total", "scope" => scope).increment(1);
}

pub fn record_task_launched() {
    metrics::counter!("background_tasks_total").increment(1);
}

pub fn record_task_completed() {
    metrics::counter!("background_tasks_completed_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};

    /// Captures counter registrations so tests can assert on names and labels.
    #[derive(Default)]
    struct CaptureRecorder {
        seen: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    }

    impl Recorder for CaptureRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            let labels = key
                .labels()
                .map(|label| format!("{}={}", label.key(), label.value()))
                .collect();
            self.seen
                .lock()
                .unwrap()
                .push((key.name().to_string(), labels));
            Counter::noop()
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn counters_carry_expected_names_and_labels() {
        let recorder = CaptureRecorder::default();
        let guard = metrics::set_default_local_recorder(&recorder);

        record_request("GET", 200);
        record_rejection("rate_limit");
        record_task_launched();
        record_task_completed();

        drop(guard);
        let seen = recorder.seen.lock().unwrap();

        assert!(seen.iter().any(|(name, labels)| {
            name == "http_requests_total"
                && labels.contains(&"method=GET".to_string())
                && labels.contains(&"status=200".to_string())
        }));
        assert!(seen
            .iter()
            .any(|(name, _)| name == "admission_rejected_total"));
        assert!(seen.iter().any(|(name, _)| name == "background_tasks_total"));
        assert!(seen
            .iter()
            .any(|(name, _)| name == "background_tasks_completed_total"));
    }
}
