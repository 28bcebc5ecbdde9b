//! Error taxonomy for server startup, serving and teardown.
//!
//! Startup errors ([`ConfigurationError`], [`BindError`]) are fatal and
//! raised before any traffic is accepted. Runtime errors ([`ServeError`])
//! terminate the whole server. Teardown errors ([`ShutdownError`]) are
//! aggregated into a [`ShutdownReport`] and never block the remaining
//! teardown steps.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::protocol::Protocol;

/// Invalid or incomplete settings, rejected before any socket opens.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{protocol} server address {address:?} is malformed: {reason}")]
    InvalidAddress {
        protocol: Protocol,
        address: String,
        reason: String,
    },

    #[error("{protocol} server TLS material is incomplete: certificate and key must be supplied together")]
    PartialTls { protocol: Protocol },

    #[error("{protocol} server TLS material could not be loaded: {message}")]
    TlsMaterial { protocol: Protocol, message: String },

    #[error("close timeout must be greater than zero")]
    ZeroCloseTimeout,
}

/// A listener failed to open. Fatal to startup; listeners already bound
/// in the same attempt are closed before this is returned.
#[derive(Debug, thiserror::Error)]
#[error("failed to bind {protocol} listener on {address}: {source}")]
pub struct BindError {
    pub protocol: Protocol,
    pub address: SocketAddr,
    #[source]
    pub source: std::io::Error,
}

/// An accept loop terminated for a reason other than an intentional
/// close. The first such error is recorded as the shutdown cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{protocol} server terminated unexpectedly: {message}")]
pub struct ServeError {
    pub protocol: Protocol,
    pub message: String,
}

/// A teardown step failed or overran the shared deadline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShutdownError {
    #[error("{protocol} server did not drain within {timeout:?}")]
    DeadlineExceeded { protocol: Protocol, timeout: Duration },

    #[error("{protocol} server failed to stop cleanly: {message}")]
    Stop { protocol: Protocol, message: String },
}

/// Aggregated outcome of one graceful close: per-protocol errors plus
/// the total elapsed time. Every caller of close receives an identical
/// clone of the winner's report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub errors: Vec<ShutdownError>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "closed cleanly in {:?}", self.elapsed);
        }
        write!(f, "closed in {:?} with {} error(s): ", self.elapsed, self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

/// Top-level error surface of the server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Serve(#[from] ServeError),

    #[error("graceful close completed with errors: {0}")]
    Shutdown(ShutdownReport),

    /// Close was requested before the server ever started listening.
    #[error("server is not running, invalid close operation")]
    NotListening,

    /// Serve was invoked on a server that already ran.
    #[error("server has already been started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_report_display() {
        let report = ShutdownReport::default();
        assert!(report.is_clean());
        assert!(report.to_string().starts_with("closed cleanly"));
    }

    #[test]
    fn report_display_lists_errors() {
        let report = ShutdownReport {
            errors: vec![
                ShutdownError::DeadlineExceeded {
                    protocol: Protocol::Rpc,
                    timeout: Duration::from_secs(1),
                },
                ShutdownError::Stop {
                    protocol: Protocol::Http,
                    message: "connection reset".into(),
                },
            ],
            elapsed: Duration::from_millis(1200),
        };
        let rendered = report.to_string();
        assert!(rendered.contains("2 error(s)"));
        assert!(rendered.contains("rpc server did not drain"));
        assert!(rendered.contains("http server failed to stop"));
    }
}
