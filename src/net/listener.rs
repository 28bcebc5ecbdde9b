//! Listener bootstrapping.
//!
//! Opens one TCP listener per enabled protocol, in a fixed order. If any
//! bind fails, every listener already opened in the same attempt is
//! closed before the error is returned, so a partial startup never leaks
//! descriptors.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ResolvedConfiguration;
use crate::errors::BindError;
use crate::protocol::Protocol;

/// An open socket bound to an address, with the address it actually got
/// (meaningful when binding port 0).
#[derive(Debug)]
pub struct BoundListener {
    pub listener: TcpListener,
    pub local_addr: SocketAddr,
}

/// The full set of listeners for one startup attempt.
///
/// Dropping this drops (closes) every contained listener, which is what
/// makes the bind-failure cleanup path below automatic: the early return
/// releases the partial set before the caller sees the error.
#[derive(Debug, Default)]
pub struct BoundListeners {
    pub debug: Option<BoundListener>,
    pub http: Option<BoundListener>,
    pub rpc: Option<BoundListener>,
}

/// Bind listeners for every enabled protocol, in the order debug, http,
/// rpc.
pub async fn bind_stack(config: &ResolvedConfiguration) -> Result<BoundListeners, BindError> {
    let mut bound = BoundListeners::default();

    for protocol in [Protocol::Debug, Protocol::Http, Protocol::Rpc] {
        let Some(service) = config.service(protocol) else {
            continue;
        };
        let listener = bind_one(protocol, service.address).await?;
        match protocol {
            Protocol::Debug => bound.debug = Some(listener),
            Protocol::Http => bound.http = Some(listener),
            Protocol::Rpc => bound.rpc = Some(listener),
        }
    }

    Ok(bound)
}

async fn bind_one(protocol: Protocol, address: SocketAddr) -> Result<BoundListener, BindError> {
    let listener = TcpListener::bind(address).await.map_err(|source| BindError {
        protocol,
        address,
        source,
    })?;

    let local_addr = listener.local_addr().map_err(|source| BindError {
        protocol,
        address,
        source,
    })?;

    tracing::info!(protocol = %protocol, address = %local_addr, "listener bound");

    Ok(BoundListener {
        listener,
        local_addr,
    })
}
