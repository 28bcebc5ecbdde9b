//! Batteries-included multi-protocol server runtime.
//!
//! A [`Server`] bootstraps up to three independent listeners, runs their
//! accept loops concurrently, and tears them down in a defined, bounded,
//! idempotent order on signal or explicit request:
//!
//! - a **debug/observability** server with a fixed endpoint set
//!   (`/ready`, `/live`, `/metrics`, `/debug/pprof/*`),
//! - a **plain HTTP** server for caller-registered routes,
//! - an **RPC** (gRPC) server for caller-registered services, with a
//!   logging/metrics interceptor chain and optional mutual TLS.
//!
//! ```no_run
//! use multiserve::Server;
//!
//! # async fn run() -> Result<(), multiserve::Error> {
//! let server = Server::builder("example")
//!     .with_debug_address(":9500")
//!     .with_rpc_address(":9501")
//!     .build()?;
//!
//! // Blocks until SIGINT/SIGTERM or an explicit close.
//! server.serve().await
//! # }
//! ```

// Core subsystems
pub mod config;
pub mod net;
pub mod protocol;
pub mod server;

// Cross-cutting concerns
pub mod errors;
pub mod health;
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfiguration;
pub use errors::{Error, ShutdownReport};
pub use health::{AlwaysHealthy, HealthReporter};
pub use lifecycle::{LifecycleState, Shutdown};
pub use observability::MetricsRegistry;
pub use server::{Server, ServerBuilder};
