//! RPC (gRPC) server.
//!
//! Wraps caller-registered tonic routes in an interceptor chain that
//! performs structured logging and metrics recording around every call,
//! then serves them on the listener opened by the bootstrapper. When the
//! resolved TLS material includes a CA, the server verifies client
//! certificates (mutual TLS).

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::{Request, Response};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tonic::service::Routes;
use tonic::transport::server::TcpIncoming;
use tonic::transport::{Server as TonicServer, ServerTlsConfig};
use tower::{Layer, Service, ServiceBuilder};
use uuid::Uuid;

use crate::errors::ServeError;
use crate::protocol::Protocol;

/// A running RPC accept loop.
pub(crate) struct RpcTask {
    /// Fires tonic's graceful shutdown: stop accepting, drain in-flight
    /// calls. The deadline is enforced by the sequencer, which aborts
    /// the task when the drain overruns.
    pub trigger: watch::Sender<()>,
    pub task: JoinHandle<Result<(), String>>,
}

/// Attach the RPC accept loop to an already-open listener.
pub(crate) fn spawn(
    listener: TcpListener,
    tls: Option<ServerTlsConfig>,
    routes: Routes,
    errors: mpsc::UnboundedSender<ServeError>,
) -> Result<RpcTask, ServeError> {
    let incoming = TcpIncoming::from_listener(listener, true, None)
        .map_err(|e| serve_error(e.to_string()))?;

    let (trigger, mut close_requested) = watch::channel(());

    let mut builder = TonicServer::builder();
    if let Some(tls) = tls {
        builder = builder
            .tls_config(tls)
            .map_err(|e| serve_error(e.to_string()))?;
    }

    let mut builder = builder.layer(
        ServiceBuilder::new()
            .layer(RpcLogLayer)
            .layer(RpcMetricsLayer)
            .into_inner(),
    );
    let router = builder.add_routes(routes);

    let task = tokio::spawn(async move {
        let result = router
            .serve_with_incoming_shutdown(incoming, async move {
                let _ = close_requested.changed().await;
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                let error = serve_error(e.to_string());
                tracing::error!(error = %error, "accept loop terminated");
                let _ = errors.send(error.clone());
                Err(error.message)
            }
        }
    });

    Ok(RpcTask { trigger, task })
}

fn serve_error(message: String) -> ServeError {
    ServeError {
        protocol: Protocol::Rpc,
        message,
    }
}

/// gRPC status carried in the response headers of a trailers-only
/// response; plain "0" (OK) otherwise.
fn grpc_status<B>(response: &Response<B>) -> String {
    response
        .headers()
        .get("grpc-status")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("0")
        .to_string()
}

type BoxedResponseFuture<R, E> = Pin<Box<dyn Future<Output = Result<R, E>> + Send>>;

/// Structured-logging interceptor: every call gets a generated call id,
/// a received event and a finished event with status and latency.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcLogLayer;

impl<S> Layer<S> for RpcLogLayer {
    type Service = RpcLog<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RpcLog { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RpcLog<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RpcLog<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxedResponseFuture<S::Response, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let call_id = Uuid::new_v4();
        let method = request.uri().path().to_owned();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let start = Instant::now();
            tracing::debug!(call_id = %call_id, method = %method, "rpc call received");

            let result = inner.call(request).await;
            match &result {
                Ok(response) => {
                    tracing::info!(
                        call_id = %call_id,
                        method = %method,
                        status = %grpc_status(response),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "rpc call finished"
                    );
                }
                Err(_) => {
                    tracing::error!(call_id = %call_id, method = %method, "rpc call failed in transport");
                }
            }
            result
        })
    }
}

/// Metrics interceptor: per-method call counter and latency histogram.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcMetricsLayer;

impl<S> Layer<S> for RpcMetricsLayer {
    type Service = RpcMetrics<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RpcMetrics { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RpcMetrics<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RpcMetrics<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxedResponseFuture<S::Response, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let method = request.uri().path().to_owned();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let start = Instant::now();
            let result = inner.call(request).await;

            if let Ok(response) = &result {
                metrics::counter!(
                    "rpc_server_handled_total",
                    "method" => method.clone(),
                    "status" => grpc_status(response),
                )
                .increment(1);
                metrics::histogram!("rpc_server_handling_seconds", "method" => method)
                    .record(start.elapsed().as_secs_f64());
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tower::service_fn;

    async fn echo(_request: Request<()>) -> Result<Response<&'static str>, Infallible> {
        Ok(Response::new("pong"))
    }

    #[tokio::test]
    async fn log_layer_passes_calls_through() {
        let mut service = RpcLogLayer.layer(service_fn(echo));
        let request = Request::builder()
            .uri("/echo.Echo/Ping")
            .body(())
            .unwrap();
        let response = service.call(request).await.unwrap();
        assert_eq!(*response.body(), "pong");
    }

    #[tokio::test]
    async fn metrics_layer_passes_calls_through() {
        let mut service = RpcMetricsLayer.layer(service_fn(echo));
        let request = Request::builder()
            .uri("/echo.Echo/Ping")
            .body(())
            .unwrap();
        let response = service.call(request).await.unwrap();
        assert_eq!(*response.body(), "pong");
    }

    #[test]
    fn status_defaults_to_ok() {
        let response = Response::new(());
        assert_eq!(grpc_status(&response), "0");

        let mut failed = Response::new(());
        failed
            .headers_mut()
            .insert("grpc-status", "13".parse().unwrap());
        assert_eq!(grpc_status(&failed), "13");
    }
}
