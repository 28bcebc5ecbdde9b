//! TLS configuration and certificate loading.

use std::io::BufReader;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;
use tonic::transport::{Certificate, Identity, ServerTlsConfig};

use crate::config::TlsMaterial;
use crate::errors::ConfigurationError;
use crate::protocol::Protocol;

/// Build the rustls acceptor config for an HTTP-family server.
pub(crate) async fn http_tls_config(
    protocol: Protocol,
    material: &TlsMaterial,
) -> Result<RustlsConfig, ConfigurationError> {
    check_certificate_pem(protocol, &material.cert)?;

    RustlsConfig::from_pem_file(&material.cert, &material.key)
        .await
        .map_err(|e| tls_error(protocol, e))
}

/// Build the tonic TLS config for the RPC server. A CA in the material
/// switches on client-certificate verification (mutual TLS).
pub(crate) fn rpc_tls_config(material: &TlsMaterial) -> Result<ServerTlsConfig, ConfigurationError> {
    check_certificate_pem(Protocol::Rpc, &material.cert)?;

    let cert = read_pem(Protocol::Rpc, &material.cert)?;
    let key = read_pem(Protocol::Rpc, &material.key)?;
    let mut config = ServerTlsConfig::new().identity(Identity::from_pem(cert, key));

    if let Some(ca) = &material.ca {
        check_certificate_pem(Protocol::Rpc, ca)?;
        let ca_pem = read_pem(Protocol::Rpc, ca)?;
        config = config.client_ca_root(Certificate::from_pem(ca_pem));
    }

    Ok(config)
}

/// Verify a PEM file exists and actually contains certificates, so a
/// wrong path fails at startup instead of on the first handshake.
fn check_certificate_pem(protocol: Protocol, path: &Path) -> Result<(), ConfigurationError> {
    let file = std::fs::File::open(path).map_err(|e| {
        tls_error(protocol, format!("cannot open {}: {e}", path.display()))
    })?;

    let mut reader = BufReader::new(file);
    let certs: Result<Vec<_>, _> = rustls_pemfile::certs(&mut reader).collect();
    let certs = certs.map_err(|e| {
        tls_error(protocol, format!("cannot parse {}: {e}", path.display()))
    })?;

    if certs.is_empty() {
        return Err(tls_error(
            protocol,
            format!("{} contains no certificates", path.display()),
        ));
    }
    Ok(())
}

fn read_pem(protocol: Protocol, path: &Path) -> Result<Vec<u8>, ConfigurationError> {
    std::fs::read(path)
        .map_err(|e| tls_error(protocol, format!("cannot read {}: {e}", path.display())))
}

fn tls_error(protocol: Protocol, message: impl ToString) -> ConfigurationError {
    ConfigurationError::TlsMaterial {
        protocol,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_certificate_file_is_reported() {
        let material = TlsMaterial {
            cert: PathBuf::from("/nonexistent/server.crt"),
            key: PathBuf::from("/nonexistent/server.key"),
            ca: None,
        };
        let err = rpc_tls_config(&material).unwrap_err();
        assert!(matches!(err, ConfigurationError::TlsMaterial { protocol: Protocol::Rpc, .. }));
    }

    #[test]
    fn non_certificate_pem_is_reported() {
        let dir = std::env::temp_dir();
        let path = dir.join("multiserve-tls-test-empty.crt");
        std::fs::write(&path, "not a certificate").unwrap();

        let err = check_certificate_pem(Protocol::Http, &path).unwrap_err();
        assert!(matches!(err, ConfigurationError::TlsMaterial { protocol: Protocol::Http, .. }));

        let _ = std::fs::remove_file(&path);
    }
}
