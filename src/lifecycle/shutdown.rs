//! Explicit close-request channel.

use tokio::sync::broadcast;

/// Broadcast trigger for requesting a graceful close.
///
/// Handed to the server at construction; the control task subscribes and
/// treats a trigger exactly like an OS termination signal. Embedders and
/// tests keep a clone and call [`Shutdown::trigger`] instead of signaling
/// the process.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to close requests.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Request a graceful close. Safe to call any number of times; only
    /// the first request that reaches the control task has any effect.
    pub fn trigger(&self) {
        // Send fails only when no control task is listening yet, which
        // is fine: close() also advances the state machine directly.
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
