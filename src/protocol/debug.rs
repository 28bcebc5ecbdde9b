//! Debug/observability server.
//!
//! Serves a fixed, non-configurable endpoint set:
//! - `GET /ready` — readiness probe; answers 503 once the server enters
//!   `Closing`, regardless of the application reporter
//! - `GET /live` — liveness probe, delegated to the application reporter
//! - `GET /metrics` — Prometheus exposition
//! - `GET /debug/pprof/*` — process snapshot
//!
//! During teardown this server is stopped last, so the probes stay
//! externally observable while the other protocols drain.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::health::HealthReporter;
use crate::lifecycle::LifecycleState;
use crate::observability::MetricsRegistry;

/// Shared state for the debug endpoints.
#[derive(Clone)]
pub(crate) struct DebugState {
    pub lifecycle: watch::Receiver<LifecycleState>,
    pub health: Arc<dyn HealthReporter>,
    pub metrics: MetricsRegistry,
    pub started: Instant,
}

/// Build the fixed debug router.
pub(crate) fn router(state: DebugState) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/metrics", get(metrics_exposition))
        .route("/debug/pprof", get(pprof_snapshot))
        .route("/debug/pprof/{*profile}", get(pprof_snapshot))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn ready(State(state): State<DebugState>) -> impl IntoResponse {
    // Once teardown starts, report not-ready so load balancers stop
    // routing here while in-flight work drains.
    if *state.lifecycle.borrow() != LifecycleState::Listening {
        return (StatusCode::SERVICE_UNAVAILABLE, "closing");
    }
    if state.health.ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn live(State(state): State<DebugState>) -> impl IntoResponse {
    if state.health.live() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not live")
    }
}

async fn metrics_exposition(State(state): State<DebugState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Point-in-time process snapshot backing `/debug/pprof/*`.
#[derive(Debug, Serialize)]
struct ProcessSnapshot {
    pid: u32,
    uptime_seconds: u64,
    threads: Option<u64>,
    vm_rss_kb: Option<u64>,
    vm_size_kb: Option<u64>,
}

impl ProcessSnapshot {
    fn capture(started: Instant) -> Self {
        let mut snapshot = Self {
            pid: std::process::id(),
            uptime_seconds: started.elapsed().as_secs(),
            threads: None,
            vm_rss_kb: None,
            vm_size_kb: None,
        };

        // Best-effort on Linux; the probe fields stay None elsewhere.
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            snapshot.threads = status_field(&status, "Threads:");
            snapshot.vm_rss_kb = status_field(&status, "VmRSS:");
            snapshot.vm_size_kb = status_field(&status, "VmSize:");
        }

        snapshot
    }
}

fn status_field(status: &str, field: &str) -> Option<u64> {
    status
        .lines()
        .find(|line| line.starts_with(field))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

async fn pprof_snapshot(State(state): State<DebugState>) -> impl IntoResponse {
    Json(ProcessSnapshot::capture(state.started))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::AlwaysHealthy;

    fn state_at(lifecycle: LifecycleState) -> DebugState {
        let (tx, rx) = watch::channel(lifecycle);
        // Keep the sender alive for the duration of the test state.
        std::mem::forget(tx);
        DebugState {
            lifecycle: rx,
            health: Arc::new(AlwaysHealthy),
            metrics: MetricsRegistry::shared(),
            started: Instant::now(),
        }
    }

    #[tokio::test]
    async fn ready_while_listening() {
        let response = ready(State(state_at(LifecycleState::Listening)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn not_ready_once_closing() {
        let response = ready(State(state_at(LifecycleState::Closing)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn liveness_ignores_lifecycle() {
        let response = live(State(state_at(LifecycleState::Closing)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn snapshot_reports_pid() {
        let snapshot = ProcessSnapshot::capture(Instant::now());
        assert!(snapshot.pid > 0);
    }

    #[test]
    fn status_field_parses_value() {
        let status = "Name:\tmultiserve\nThreads:\t12\nVmRSS:\t  2048 kB\n";
        assert_eq!(status_field(status, "Threads:"), Some(12));
        assert_eq!(status_field(status, "VmRSS:"), Some(2048));
        assert_eq!(status_field(status, "VmSwap:"), None);
    }
}
