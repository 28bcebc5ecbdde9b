//! Metrics registration and exposition.
//!
//! # Responsibilities
//! - Own the Prometheus recorder handle backing `GET /metrics`
//! - Install the process-wide recorder on first use
//!
//! # Metrics contributed by this crate
//! - `rpc_server_handled_total` (counter): RPC calls by method, status
//! - `rpc_server_handling_seconds` (histogram): RPC latency by method
//!
//! Application metrics recorded through the `metrics` macros land in the
//! same recorder and are exported on the same endpoint.

use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static SHARED_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Handle onto the Prometheus recorder that collects everything recorded
/// through the `metrics` macros in this process.
///
/// The `metrics` crate records through one global recorder, so the
/// default registry is shared process-wide and installed on first use.
/// Embedders that manage their own recorder inject its handle through
/// [`MetricsRegistry::from_handle`].
#[derive(Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// The process-wide registry, installing the recorder if this is the
    /// first use.
    pub fn shared() -> Self {
        let handle = SHARED_HANDLE
            .get_or_init(|| {
                let recorder = PrometheusBuilder::new().build_recorder();
                let handle = recorder.handle();
                if metrics::set_global_recorder(recorder).is_err() {
                    tracing::warn!(
                        "a global metrics recorder is already installed; \
                         /metrics will only expose metrics from this crate's own handle"
                    );
                }
                handle
            })
            .clone();
        Self { handle }
    }

    /// Wrap an externally managed recorder handle.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Render the current contents in Prometheus exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::shared()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_registry_renders() {
        let registry = MetricsRegistry::shared();
        metrics::counter!("observability_test_total").increment(1);
        let rendered = registry.render();
        assert!(rendered.contains("observability_test_total"));
    }
}
