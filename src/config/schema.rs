//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files;
//! the builder fills the same structs programmatically.

use serde::{Deserialize, Serialize};

/// Root configuration for a multi-protocol server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfiguration {
    /// Per-protocol service entries. An absent entry disables that
    /// protocol.
    pub services: ServicesConfiguration,

    /// Shared deadline for the whole graceful close sequence, in
    /// seconds. Zero is rejected at resolution time.
    pub close_timeout_secs: u64,
}

impl ServerConfiguration {
    pub const DEFAULT_CLOSE_TIMEOUT_SECS: u64 = 10;
}

impl Default for ServerConfiguration {
    fn default() -> Self {
        Self {
            services: ServicesConfiguration::default(),
            close_timeout_secs: Self::DEFAULT_CLOSE_TIMEOUT_SECS,
        }
    }
}

/// The set of network-facing services a server may expose.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServicesConfiguration {
    /// Observability/debug endpoints (probes, metrics, pprof).
    pub debug: Option<ServiceConfiguration>,

    /// Plain HTTP endpoint for caller-registered routes.
    pub http: Option<ServiceConfiguration>,

    /// gRPC endpoint for caller-registered services.
    pub rpc: Option<ServiceConfiguration>,
}

/// One service entry: where to listen, and whether to terminate TLS.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfiguration {
    /// Bind address, e.g. "127.0.0.1:9500" or ":9500". An empty string
    /// disables the service, same as omitting the entry.
    pub address: String,

    /// Optional TLS material for this service.
    pub tls: Option<TlsSettings>,
}

impl ServiceConfiguration {
    pub fn at(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            tls: None,
        }
    }
}

/// TLS material locations (PEM files).
///
/// Certificate and key must be supplied together; the CA is only
/// consulted by the RPC server, where it switches on client-certificate
/// verification (mutual TLS).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsSettings {
    /// Path to the CA bundle used to verify client certificates.
    pub ca_path: Option<String>,

    /// Path to the server certificate chain.
    pub cert_path: Option<String>,

    /// Path to the server private key.
    pub key_path: Option<String>,
}
