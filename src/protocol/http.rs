//! HTTP-family accept loops (debug and plain servers).
//!
//! Both servers run on `axum_server` so graceful shutdown goes through a
//! [`Handle`]: the sequencer stops the accept loop, lets in-flight
//! requests finish up to the shared deadline, then force-closes what
//! remains. The plain server serves the caller's router untouched; this
//! crate contributes no middleware to it.

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::ServeError;
use crate::protocol::Protocol;

/// A running HTTP-family accept loop.
///
/// The listener lives inside the task; joining (or aborting) the task is
/// what closes it.
pub(crate) struct HttpTask {
    /// Graceful-shutdown handle for the accept loop.
    pub handle: Handle,
    /// The accept-loop task. Resolves with the serve error message when
    /// the loop died on its own.
    pub task: JoinHandle<Result<(), String>>,
}

/// Attach an accept loop to an already-open listener.
pub(crate) fn spawn(
    protocol: Protocol,
    listener: std::net::TcpListener,
    tls: Option<RustlsConfig>,
    router: Router,
    errors: mpsc::UnboundedSender<ServeError>,
) -> HttpTask {
    let handle = Handle::new();
    let serve_handle = handle.clone();

    let task = tokio::spawn(async move {
        let service = router.into_make_service();
        let result = match tls {
            Some(config) => {
                axum_server::from_tcp_rustls(listener, config)
                    .handle(serve_handle)
                    .serve(service)
                    .await
            }
            None => {
                axum_server::from_tcp(listener)
                    .handle(serve_handle)
                    .serve(service)
                    .await
            }
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                let error = ServeError {
                    protocol,
                    message: e.to_string(),
                };
                tracing::error!(protocol = %protocol, error = %error, "accept loop terminated");
                let _ = errors.send(error.clone());
                Err(error.message)
            }
        }
    });

    HttpTask { handle, task }
}
