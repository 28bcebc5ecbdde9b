//! Structured logging initialization.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for a server process.
///
/// Respects `RUST_LOG`; falls back to info-level output for this crate.
/// Call once at process start, before building a server.
pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multiserve=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
