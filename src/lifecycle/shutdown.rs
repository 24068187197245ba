//! Graceful-shutdown signal for the monitor loop and friends.

use tokio::sync::broadcast;

/// Fan-out shutdown signal.
///
/// One `Shutdown` lives next to the components that spawn background work;
/// each spawned task takes a receiver via [`subscribe`](Self::subscribe)
/// and selects on it alongside its own work. Triggering with no
/// subscribers is a no-op.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscribed task to wind down.
    pub fn trigger(&self) {
        tracing::info!(
            subscribers = self.tx.receiver_count(),
            "shutdown triggered"
        );
        let _ = self.tx.send(());
    }

    /// Tasks that have subscribed and not yet exited.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
