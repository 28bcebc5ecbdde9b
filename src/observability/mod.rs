//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms via the metrics recorder)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → GET /metrics on the debug server (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use metrics::MetricsRegistry;
