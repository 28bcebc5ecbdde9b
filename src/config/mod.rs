//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or builder calls
//!     → schema.rs (serde structs, defaults)
//!     → validation.rs (resolver: normalize addresses, pair-check TLS,
//!                      default the close timeout)
//!     → ResolvedConfiguration (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Configuration is immutable once resolved; there is no reload path
//! - An absent service entry, or one with an empty address, disables
//!   that protocol entirely
//! - The resolver is a pure function: no sockets, no filesystem access

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{ServerConfiguration, ServiceConfiguration, ServicesConfiguration, TlsSettings};
pub use validation::{resolve, ResolvedConfiguration, ResolvedService, TlsMaterial};
