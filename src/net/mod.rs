//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ResolvedConfiguration
//!     → listener.rs (ordered bind: debug, then http, then rpc;
//!       partial failure drops everything bound so far)
//!     → tls.rs (PEM loading for the HTTP-family and RPC servers)
//!     → Listeners handed to the protocol servers
//! ```
//!
//! # Design Decisions
//! - A listener is owned by exactly one serving task; the manager
//!   guarantees it is closed exactly once on every exit path
//! - No retry on bind failure; the attempt is terminal

pub mod listener;
pub mod tls;

pub use listener::{bind_stack, BoundListener, BoundListeners};
