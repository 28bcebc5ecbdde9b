//! Server composition surface.
//!
//! # Data Flow
//! ```text
//! ServerBuilder (builder.rs)
//!     → resolve configuration, collect providers and routes
//!     → Server (manager.rs)
//!
//! Server::serve():
//!     load TLS → bind listeners (ordered) → spawn accept loops
//!     → Listening → control wait (signal | close request | first
//!     accept-loop error) → shutdown sequencer → Closed
//!
//! Server::close():
//!     CAS Listening → Closing picks one winner; the winner drains
//!     rpc, then http, then debug under one shared deadline; every
//!     caller receives the identical ShutdownReport
//! ```
//!
//! # Design Decisions
//! - First cause wins: only the earliest termination cause is acted on;
//!   later causes are logged and ignored
//! - The debug server stops last so probes stay visible during drain
//! - No retries anywhere: bind and drain failures are terminal

mod builder;
mod manager;

pub use builder::ServerBuilder;
pub use manager::Server;
