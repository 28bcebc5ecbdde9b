//! OS signal handling.
//!
//! SIGINT and SIGTERM both drive the same graceful close path as an
//! explicit [`super::Shutdown`] trigger. SIGHUP is deliberately not
//! handled: configuration is immutable once resolved.

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
pub async fn termination_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, closing server");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, closing server");
        }
    }
}
