//! Health probe contract for the debug server.
//!
//! The server does not decide application health itself; embedders hand
//! in a [`HealthReporter`] and the debug endpoints consult it. Readiness
//! additionally flips to "not ready" once the server starts closing,
//! independent of what the reporter says.

use std::sync::Arc;

/// Application-supplied readiness and liveness probes.
pub trait HealthReporter: Send + Sync + 'static {
    /// Whether the application is ready to take traffic.
    fn ready(&self) -> bool;

    /// Whether the process is alive and should not be restarted.
    fn live(&self) -> bool;
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn ready(&self) -> bool {
        (**self).ready()
    }

    fn live(&self) -> bool {
        (**self).live()
    }
}

/// Default reporter: always ready, always live.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

impl HealthReporter for AlwaysHealthy {
    fn ready(&self) -> bool {
        true
    }

    fn live(&self) -> bool {
        true
    }
}

pub(crate) fn default_reporter() -> Arc<dyn HealthReporter> {
    Arc::new(AlwaysHealthy)
}
