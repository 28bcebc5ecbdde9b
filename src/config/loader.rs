//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServerConfiguration;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load a configuration from a TOML file.
///
/// Only the syntactic layer happens here; semantic validation runs in
/// the resolver when the server is built.
pub fn load_configuration(path: &Path) -> Result<ServerConfiguration, LoadError> {
    let content = fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_entries() {
        let raw = r#"
            close_timeout_secs = 3

            [services.debug]
            address = ":9500"

            [services.rpc]
            address = "127.0.0.1:9501"

            [services.rpc.tls]
            cert_path = "server.crt"
            key_path = "server.key"
            ca_path = "ca.crt"
        "#;
        let config: ServerConfiguration = toml::from_str(raw).unwrap();
        assert_eq!(config.close_timeout_secs, 3);
        assert_eq!(config.services.debug.as_ref().unwrap().address, ":9500");
        assert!(config.services.http.is_none());
        let rpc = config.services.rpc.unwrap();
        assert_eq!(rpc.tls.unwrap().ca_path.as_deref(), Some("ca.crt"));
    }
}
