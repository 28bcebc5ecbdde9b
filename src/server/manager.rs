//! Server lifecycle manager: bootstrap, concurrent serving, and the
//! ordered, deadline-bounded, idempotent shutdown sequence.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tonic::service::Routes;

use crate::config::{ResolvedConfiguration, ResolvedService};
use crate::errors::{Error, ServeError, ShutdownError, ShutdownReport};
use crate::health::HealthReporter;
use crate::lifecycle::state::StateCell;
use crate::lifecycle::{signals, LifecycleState, Shutdown};
use crate::net::{self, BoundListener};
use crate::observability::MetricsRegistry;
use crate::protocol::{debug, http, rpc, Protocol};

/// A multi-protocol server with managed lifecycle.
///
/// Composed of up to three independently runnable protocol servers:
/// - a debug/observability server (`/ready`, `/live`, `/metrics`,
///   `/debug/pprof/*`),
/// - a plain HTTP server for caller-registered routes,
/// - an RPC server for caller-registered services, with a logging and
///   metrics interceptor chain and optional mutual TLS.
///
/// Cloning is cheap and every clone drives the same underlying server,
/// which is what makes concurrent [`Server::close`] calls safe: the
/// teardown body runs exactly once and every caller receives the same
/// [`ShutdownReport`].
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    name: String,
    config: ResolvedConfiguration,
    state: StateCell,
    health: Arc<dyn HealthReporter>,
    metrics: MetricsRegistry,
    shutdown: Shutdown,
    /// Caller-registered handlers, consumed by the single serve attempt.
    http_router: Mutex<Option<axum::Router>>,
    rpc_routes: Mutex<Option<Routes>>,
    /// Accept loops of the current attempt, consumed by the sequencer.
    running: tokio::sync::Mutex<Option<RunningServers>>,
    addresses: Mutex<Addresses>,
    report: OnceLock<ShutdownReport>,
}

#[derive(Debug, Clone, Default)]
struct Addresses {
    debug: String,
    http: String,
    rpc: String,
}

#[derive(Default)]
struct RunningServers {
    debug: Option<http::HttpTask>,
    http: Option<http::HttpTask>,
    rpc: Option<rpc::RpcTask>,
}

impl Server {
    /// Start building a server. `name` appears in lifecycle logs.
    pub fn builder(name: impl Into<String>) -> super::ServerBuilder {
        super::ServerBuilder::new(name)
    }

    pub(crate) fn assemble(
        name: String,
        config: ResolvedConfiguration,
        health: Arc<dyn HealthReporter>,
        metrics: MetricsRegistry,
        http_router: axum::Router,
        rpc_routes: Routes,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                name,
                config,
                state: StateCell::new(),
                health,
                metrics,
                shutdown,
                http_router: Mutex::new(Some(http_router)),
                rpc_routes: Mutex::new(Some(rpc_routes)),
                running: tokio::sync::Mutex::new(None),
                addresses: Mutex::new(Addresses::default()),
                report: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.inner.metrics
    }

    pub fn health(&self) -> Arc<dyn HealthReporter> {
        self.inner.health.clone()
    }

    /// The close trigger bound to this server.
    pub fn shutdown(&self) -> Shutdown {
        self.inner.shutdown.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.current()
    }

    /// Wait until the lifecycle has reached `target` (or passed it).
    pub async fn wait_for_state(&self, target: LifecycleState) {
        self.inner.state.reached(target).await;
    }

    /// Resolved debug server address (`http[s]://host:port`), or an
    /// empty string when the debug server is not configured or not yet
    /// bound.
    pub fn debug_address(&self) -> String {
        self.address_table().debug
    }

    /// Resolved plain HTTP server address, same conventions as
    /// [`Server::debug_address`].
    pub fn http_address(&self) -> String {
        self.address_table().http
    }

    /// Resolved RPC server address (`host:port`), or an empty string.
    pub fn rpc_address(&self) -> String {
        self.address_table().rpc
    }

    /// Where readiness is probed; alias for [`Server::debug_address`].
    pub fn readiness_address(&self) -> String {
        self.debug_address()
    }

    fn address_table(&self) -> Addresses {
        self.inner
            .addresses
            .lock()
            .expect("address table lock poisoned")
            .clone()
    }

    /// Bootstrap the configured listeners, run all accept loops, and
    /// block until graceful teardown has completed.
    ///
    /// Teardown starts on the first of: an OS termination signal, a
    /// [`Shutdown`] trigger (or [`Server::close`] call), or a terminal
    /// accept-loop error. Returns `Ok(())` after a clean close,
    /// `Err(Error::Serve)` when an accept loop was the cause, and
    /// `Err(Error::Shutdown)` when teardown itself reported errors.
    pub async fn serve(&self) -> Result<(), Error> {
        let inner = &self.inner;

        // Claim the single serve attempt; the lock is held across
        // bootstrap so a racing serve call cannot double-bind.
        let mut running_slot = inner.running.lock().await;
        if inner.state.current() != LifecycleState::Created || running_slot.is_some() {
            return Err(Error::AlreadyStarted);
        }

        // Subscribe before Listening is ever observable: close() only
        // proceeds past its state check once Listening is set, so its
        // trigger cannot land before this receiver exists.
        let mut close_requests = inner.shutdown.subscribe();

        // TLS material first: a pure configuration failure, nothing to
        // clean up yet.
        let debug_tls = match &inner.config.debug {
            Some(ResolvedService { tls: Some(material), .. }) => {
                Some(net::tls::http_tls_config(Protocol::Debug, material).await?)
            }
            _ => None,
        };
        let http_tls = match &inner.config.http {
            Some(ResolvedService { tls: Some(material), .. }) => {
                Some(net::tls::http_tls_config(Protocol::Http, material).await?)
            }
            _ => None,
        };
        let rpc_tls = match &inner.config.rpc {
            Some(ResolvedService { tls: Some(material), .. }) => {
                Some(net::tls::rpc_tls_config(material)?)
            }
            _ => None,
        };

        // Ordered bootstrap; a partial failure has already closed every
        // listener of this attempt when the error surfaces here.
        let bound = net::bind_stack(&inner.config).await?;
        self.record_addresses(&bound);

        // Convert the HTTP-family listeners before anything is spawned,
        // so a conversion failure cannot strand a running accept loop.
        let debug_listener = prepare_std(Protocol::Debug, bound.debug)?;
        let http_listener = prepare_std(Protocol::Http, bound.http)?;
        let rpc_listener = bound.rpc;

        let (errors_tx, mut errors_rx) = mpsc::unbounded_channel();
        let mut servers = RunningServers::default();

        // The RPC spawn is the only fallible one; do it first so a
        // failure leaves no task behind (the unspawned listeners above
        // are dropped, and therefore closed, by the early return).
        if let Some(listener) = rpc_listener {
            let routes = inner
                .rpc_routes
                .lock()
                .expect("rpc routes lock poisoned")
                .take()
                .unwrap_or_default();
            servers.rpc = Some(
                rpc::spawn(listener.listener, rpc_tls, routes, errors_tx.clone())
                    .map_err(Error::Serve)?,
            );
        }

        if let Some((listener, _)) = debug_listener {
            let state = debug::DebugState {
                lifecycle: inner.state.subscribe(),
                health: inner.health.clone(),
                metrics: inner.metrics.clone(),
                started: Instant::now(),
            };
            servers.debug = Some(http::spawn(
                Protocol::Debug,
                listener,
                debug_tls,
                debug::router(state),
                errors_tx.clone(),
            ));
        }

        if let Some((listener, _)) = http_listener {
            let router = inner
                .http_router
                .lock()
                .expect("http router lock poisoned")
                .take()
                .unwrap_or_default();
            servers.http = Some(http::spawn(
                Protocol::Http,
                listener,
                http_tls,
                router,
                errors_tx.clone(),
            ));
        }

        *running_slot = Some(servers);
        drop(running_slot);

        inner.state.advance(LifecycleState::Created, LifecycleState::Listening);
        tracing::info!(
            name = %inner.name,
            debug = %self.debug_address(),
            http = %self.http_address(),
            rpc = %self.rpc_address(),
            "server listening"
        );

        // Control wait: first cause wins.
        let cause = tokio::select! {
            _ = signals::termination_signal() => None,
            _ = close_requests.recv() => {
                tracing::info!(name = %inner.name, "close requested, shutting down");
                None
            }
            // Covers any path that advances the state without going
            // through this server's trigger.
            _ = inner.state.reached(LifecycleState::Closing) => None,
            failure = errors_rx.recv() => {
                // recv() cannot yield None here: serve holds errors_tx.
                failure.inspect(|e| {
                    tracing::error!(name = %inner.name, error = %e, "accept loop failed, closing remaining servers");
                })
            }
        };

        let report = self.close_with_cause(cause.clone()).await;

        // Secondary failures during drain are observed, never acted on.
        while let Ok(e) = errors_rx.try_recv() {
            tracing::warn!(name = %inner.name, error = %e, "accept loop error during drain, ignored");
        }

        match cause {
            Some(error) => Err(Error::Serve(error)),
            None if report.is_clean() => Ok(()),
            None => Err(Error::Shutdown(report)),
        }
    }

    /// Request a graceful close and wait for it to complete.
    ///
    /// Fully idempotent: invoked N times concurrently, the teardown body
    /// executes exactly once and all N callers receive the identical
    /// aggregated report. Returns [`Error::NotListening`] when the
    /// server never started serving.
    pub async fn close(&self) -> Result<ShutdownReport, Error> {
        if self.inner.state.current() == LifecycleState::Created {
            return Err(Error::NotListening);
        }
        // Wake serve()'s control wait, then join the winner's teardown
        // (or run it, if this caller wins the state transition).
        self.inner.shutdown.trigger();
        Ok(self.close_with_cause(None).await)
    }

    async fn close_with_cause(&self, cause: Option<ServeError>) -> ShutdownReport {
        let inner = &self.inner;
        if inner.state.advance(LifecycleState::Listening, LifecycleState::Closing) {
            let report = self.run_sequencer(cause).await;
            let _ = inner.report.set(report.clone());
            inner.state.advance(LifecycleState::Closing, LifecycleState::Closed);
            report
        } else {
            tracing::debug!(name = %inner.name, "close already in progress, awaiting result");
            inner.state.reached(LifecycleState::Closed).await;
            inner.report.get().cloned().unwrap_or_default()
        }
    }

    /// The teardown body. Runs exactly once, in the winner of the
    /// `Listening → Closing` transition.
    async fn run_sequencer(&self, cause: Option<ServeError>) -> ShutdownReport {
        let inner = &self.inner;
        let started = Instant::now();
        let timeout = inner.config.close_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let cause_protocol = cause.as_ref().map(|e| e.protocol);

        tracing::info!(name = %inner.name, timeout = ?timeout, "graceful shutdown started");

        let mut errors = Vec::new();
        let servers = inner.running.lock().await.take();
        let Some(mut servers) = servers else {
            return ShutdownReport {
                errors,
                elapsed: started.elapsed(),
            };
        };

        // RPC first: stop accepting, let in-flight calls finish.
        if let Some(rpc) = servers.rpc.take() {
            let _ = rpc.trigger.send(());
            drain(Protocol::Rpc, rpc.task, deadline, timeout, cause_protocol, &mut errors).await;
            tracing::info!(name = %inner.name, "rpc server terminated");
        }

        // Then the plain HTTP server.
        if let Some(http) = servers.http.take() {
            http.handle.graceful_shutdown(Some(remaining(deadline)));
            drain(Protocol::Http, http.task, deadline, timeout, cause_protocol, &mut errors).await;
            tracing::info!(name = %inner.name, "http server terminated");
        }

        // Debug last: probes stay externally observable for as long as
        // possible while the other two drain.
        if let Some(debug) = servers.debug.take() {
            debug.handle.graceful_shutdown(Some(remaining(deadline)));
            drain(Protocol::Debug, debug.task, deadline, timeout, cause_protocol, &mut errors).await;
            tracing::info!(name = %inner.name, "debug server terminated");
        }

        let report = ShutdownReport {
            errors,
            elapsed: started.elapsed(),
        };
        tracing::info!(name = %inner.name, result = %report, "graceful shutdown finished");
        report
    }

    fn record_addresses(&self, bound: &net::BoundListeners) {
        let mut addresses = self
            .inner
            .addresses
            .lock()
            .expect("address table lock poisoned");
        if let (Some(service), Some(listener)) = (&self.inner.config.debug, &bound.debug) {
            addresses.debug = http_address(service, listener.local_addr);
        }
        if let (Some(service), Some(listener)) = (&self.inner.config.http, &bound.http) {
            addresses.http = http_address(service, listener.local_addr);
        }
        if let Some(listener) = &bound.rpc {
            addresses.rpc = listener.local_addr.to_string();
        }
    }
}

/// Drain one protocol server: await its accept-loop task up to the
/// shared deadline, force-abandon it on overrun, and collect the
/// resulting error (unless the task's failure was already recorded as
/// the shutdown cause).
async fn drain(
    protocol: Protocol,
    mut task: tokio::task::JoinHandle<Result<(), String>>,
    deadline: tokio::time::Instant,
    timeout: Duration,
    cause_protocol: Option<Protocol>,
    errors: &mut Vec<ShutdownError>,
) {
    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(message))) => {
            // The accept loop died on its own; if that death triggered
            // this shutdown it is the recorded cause, not a stop error.
            if cause_protocol != Some(protocol) {
                errors.push(ShutdownError::Stop { protocol, message });
            }
        }
        Ok(Err(join_error)) => {
            errors.push(ShutdownError::Stop {
                protocol,
                message: join_error.to_string(),
            });
        }
        Err(_) => {
            // Deadline overrun: abandon the remaining connections. The
            // join below is what guarantees the listener is released
            // before the sequencer moves on.
            task.abort();
            let _ = task.await;
            errors.push(ShutdownError::DeadlineExceeded { protocol, timeout });
        }
    }
}

fn remaining(deadline: tokio::time::Instant) -> Duration {
    deadline.saturating_duration_since(tokio::time::Instant::now())
}

fn http_address(service: &ResolvedService, addr: SocketAddr) -> String {
    let scheme = if service.tls.is_some() { "https" } else { "http" };
    format!("{scheme}://{addr}")
}

/// Convert a bound listener to std form for `axum_server`, keeping its
/// resolved address alongside.
fn prepare_std(
    protocol: Protocol,
    bound: Option<BoundListener>,
) -> Result<Option<(std::net::TcpListener, SocketAddr)>, Error> {
    let Some(bound) = bound else {
        return Ok(None);
    };
    let address = bound.local_addr;
    let listener = bound.listener.into_std().map_err(|source| {
        Error::Bind(crate::errors::BindError {
            protocol,
            address,
            source,
        })
    })?;
    Ok(Some((listener, address)))
}
