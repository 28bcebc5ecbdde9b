//! Protocol server subsystem.
//!
//! # Data Flow
//! ```text
//! Bound listener (net/listener.rs)
//!     → debug.rs  (fixed observability router: probes, metrics, pprof)
//!     → http.rs   (caller-registered axum router, no built-in middleware)
//!     → rpc.rs    (caller-registered tonic routes behind the
//!                  logging + metrics interceptor chain, optional mTLS)
//!
//! Each server:
//!     start = attach an accept loop to its already-open listener
//!     stop  = stop accepting, drain in-flight work to a deadline,
//!             force-close the remainder
//! ```
//!
//! # Design Decisions
//! - Servers never bind their own sockets; listeners are opened by the
//!   bootstrapper and handed over
//! - Accept-loop failures are reported, never retried here
//! - The debug endpoint set is fixed and not caller-extensible

pub mod debug;
pub mod http;
pub mod rpc;

use std::fmt;

/// The three network-facing protocols the server can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Observability and debug endpoints (probes, metrics, pprof).
    Debug,
    /// Plain HTTP endpoint serving caller-registered routes.
    Http,
    /// gRPC endpoint serving caller-registered services.
    Rpc,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Debug => "debug",
            Protocol::Http => "http",
            Protocol::Rpc => "rpc",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
