//! Server construction.

use std::sync::Arc;
use std::time::Duration;

use tonic::service::Routes;

use crate::config::{self, ServerConfiguration, ServiceConfiguration, TlsSettings};
use crate::errors::ConfigurationError;
use crate::health::{self, HealthReporter};
use crate::lifecycle::Shutdown;
use crate::observability::MetricsRegistry;
use crate::protocol::Protocol;
use crate::server::manager::Server;

/// Builder for a [`Server`].
///
/// Validation happens in [`ServerBuilder::build`]; no sockets are opened
/// until [`Server::serve`] runs.
pub struct ServerBuilder {
    name: String,
    config: ServerConfiguration,
    close_timeout: Option<Duration>,
    health: Option<Arc<dyn HealthReporter>>,
    metrics: Option<MetricsRegistry>,
    http_router: Option<axum::Router>,
    rpc_routes: Option<Routes>,
    shutdown: Option<Shutdown>,
}

impl ServerBuilder {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ServerConfiguration::default(),
            close_timeout: None,
            health: None,
            metrics: None,
            http_router: None,
            rpc_routes: None,
            shutdown: None,
        }
    }

    /// Start from a complete configuration (e.g. loaded from a file).
    pub fn with_configuration(mut self, config: ServerConfiguration) -> Self {
        self.config = config;
        self
    }

    /// Enable the debug/observability server on `address`.
    pub fn with_debug_address(mut self, address: impl Into<String>) -> Self {
        self.service_mut(Protocol::Debug).address = address.into();
        self
    }

    /// Enable the plain HTTP server on `address`.
    pub fn with_http_address(mut self, address: impl Into<String>) -> Self {
        self.service_mut(Protocol::Http).address = address.into();
        self
    }

    /// Enable the RPC server on `address`.
    pub fn with_rpc_address(mut self, address: impl Into<String>) -> Self {
        self.service_mut(Protocol::Rpc).address = address.into();
        self
    }

    /// TLS material for one protocol. Only meaningful together with an
    /// address for the same protocol.
    pub fn with_tls(mut self, protocol: Protocol, tls: TlsSettings) -> Self {
        self.service_mut(protocol).tls = Some(tls);
        self
    }

    /// Shared deadline for the whole graceful close sequence. Overrides
    /// the configuration value and allows sub-second granularity.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = Some(timeout);
        self
    }

    /// Application readiness/liveness probes for the debug server.
    pub fn with_health(mut self, reporter: impl HealthReporter) -> Self {
        self.health = Some(Arc::new(reporter));
        self
    }

    /// Metrics registry backing `GET /metrics`.
    pub fn with_metrics(mut self, registry: MetricsRegistry) -> Self {
        self.metrics = Some(registry);
        self
    }

    /// Routes served by the plain HTTP server.
    pub fn with_http_router(mut self, router: axum::Router) -> Self {
        self.http_router = Some(router);
        self
    }

    /// Services served by the RPC server.
    pub fn with_rpc_routes(mut self, routes: Routes) -> Self {
        self.rpc_routes = Some(routes);
        self
    }

    /// External close trigger, so embedders and tests can request
    /// shutdown without process signals.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Resolve the configuration and assemble the server.
    pub fn build(self) -> Result<Server, ConfigurationError> {
        let mut resolved = config::resolve(&self.config)?;
        if let Some(timeout) = self.close_timeout {
            if timeout.is_zero() {
                return Err(ConfigurationError::ZeroCloseTimeout);
            }
            resolved.close_timeout = timeout;
        }

        Ok(Server::assemble(
            self.name,
            resolved,
            self.health.unwrap_or_else(health::default_reporter),
            self.metrics.unwrap_or_default(),
            self.http_router.unwrap_or_default(),
            self.rpc_routes.unwrap_or_default(),
            self.shutdown.unwrap_or_default(),
        ))
    }

    fn service_mut(&mut self, protocol: Protocol) -> &mut ServiceConfiguration {
        let slot = match protocol {
            Protocol::Debug => &mut self.config.services.debug,
            Protocol::Http => &mut self.config.services.http,
            Protocol::Rpc => &mut self.config.services.rpc,
        };
        slot.get_or_insert_with(ServiceConfiguration::default)
    }
}
