//! Prometheus metrics for mediator dispatch.
//!
//! The recorder is installed once per process; `/metrics` renders the stored
//! handle in-process. When metrics are disabled the `metrics` macros are
//! no-ops and `render` returns `None`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    MediatorRequests,
    MediatorRequestDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::MediatorRequests => "vehicles_mediator_requests_total",
            MetricName::MediatorRequestDuration => "vehicles_mediator_request_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder. Idempotent; later calls return the same handle.
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = HANDLE.get() {
        return Some(handle.clone());
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            info!("Prometheus recorder installed");
            HANDLE.get().cloned()
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    }
}

pub fn render() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}

pub mod mediator {
    use super::*;

    pub fn request_dispatched(request: &'static str, succeeded: bool, elapsed: Duration) {
        let outcome = if succeeded { "ok" } else { "error" };
        ::metrics::counter!(
            MetricName::MediatorRequests.as_str(),
            "request" => request,
            "outcome" => outcome
        )
        .increment(1);
        ::metrics::histogram!(
            MetricName::MediatorRequestDuration.as_str(),
            "request" => request
        )
        .record(elapsed.as_secs_f64());
    }
}
