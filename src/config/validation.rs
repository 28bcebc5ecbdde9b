//! Configuration resolution and semantic validation.
//!
//! Serde handles the syntactic layer; this module turns a raw
//! [`ServerConfiguration`] into the immutable, validated form the rest
//! of the server runs on. Pure function: no sockets are opened and no
//! files are read here.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::schema::{ServerConfiguration, ServiceConfiguration, TlsSettings};
use crate::errors::ConfigurationError;
use crate::protocol::Protocol;

/// Validated, immutable settings for one startup attempt.
#[derive(Debug, Clone)]
pub struct ResolvedConfiguration {
    pub debug: Option<ResolvedService>,
    pub http: Option<ResolvedService>,
    pub rpc: Option<ResolvedService>,
    pub close_timeout: Duration,
}

impl ResolvedConfiguration {
    pub fn service(&self, protocol: Protocol) -> Option<&ResolvedService> {
        match protocol {
            Protocol::Debug => self.debug.as_ref(),
            Protocol::Http => self.http.as_ref(),
            Protocol::Rpc => self.rpc.as_ref(),
        }
    }
}

/// One enabled service: a parsed bind address plus optional TLS.
#[derive(Debug, Clone)]
pub struct ResolvedService {
    pub protocol: Protocol,
    pub address: SocketAddr,
    pub tls: Option<TlsMaterial>,
}

/// Complete TLS material for one service.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: Option<PathBuf>,
}

/// Resolve and validate a raw configuration.
pub fn resolve(config: &ServerConfiguration) -> Result<ResolvedConfiguration, ConfigurationError> {
    if config.close_timeout_secs == 0 {
        return Err(ConfigurationError::ZeroCloseTimeout);
    }

    Ok(ResolvedConfiguration {
        debug: resolve_service(Protocol::Debug, config.services.debug.as_ref())?,
        http: resolve_service(Protocol::Http, config.services.http.as_ref())?,
        rpc: resolve_service(Protocol::Rpc, config.services.rpc.as_ref())?,
        close_timeout: Duration::from_secs(config.close_timeout_secs),
    })
}

fn resolve_service(
    protocol: Protocol,
    service: Option<&ServiceConfiguration>,
) -> Result<Option<ResolvedService>, ConfigurationError> {
    let Some(service) = service else {
        return Ok(None);
    };
    // An empty address disables the service, same as omitting the entry.
    if service.address.is_empty() {
        return Ok(None);
    }

    let address = normalize_address(protocol, &service.address)?;
    let tls = match &service.tls {
        Some(settings) => Some(resolve_tls(protocol, settings)?),
        None => None,
    };

    Ok(Some(ResolvedService {
        protocol,
        address,
        tls,
    }))
}

/// Parse a bind address, accepting the ":port" shorthand for loopback.
fn normalize_address(protocol: Protocol, raw: &str) -> Result<SocketAddr, ConfigurationError> {
    let candidate = if raw.starts_with(':') {
        format!("127.0.0.1{raw}")
    } else {
        raw.to_string()
    };

    candidate
        .parse()
        .map_err(|e: std::net::AddrParseError| ConfigurationError::InvalidAddress {
            protocol,
            address: raw.to_string(),
            reason: e.to_string(),
        })
}

fn resolve_tls(protocol: Protocol, settings: &TlsSettings) -> Result<TlsMaterial, ConfigurationError> {
    match (&settings.cert_path, &settings.key_path) {
        (Some(cert), Some(key)) => Ok(TlsMaterial {
            cert: PathBuf::from(cert),
            key: PathBuf::from(key),
            ca: settings.ca_path.as_ref().map(PathBuf::from),
        }),
        // A tls table without both halves of the keypair is a config
        // mistake, not a request for plaintext.
        _ => Err(ConfigurationError::PartialTls { protocol }),
    }
}
