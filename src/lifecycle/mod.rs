//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! State (state.rs):
//!     Created → Listening → Closing → Closed
//!     Strictly forward; Listening → Closing is a single-winner
//!     compare-and-swap, so teardown runs exactly once
//!
//! Shutdown (shutdown.rs):
//!     Explicit close request → broadcast to the control task
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → same path as an explicit close request
//! ```
//!
//! # Design Decisions
//! - The state cell is the only mutable state shared across tasks;
//!   everything synchronizes on it, never on server internals
//! - Duplicate close triggers are observed and logged, never acted on
//! - The close trigger is handed in at construction so tests drive
//!   shutdown without touching process-wide signal handlers

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::Shutdown;
pub use state::LifecycleState;
