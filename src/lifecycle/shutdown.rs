//! Shutdown coordination for the server.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once the receiver observes a trigger (or the sender is gone).
pub async fn wait_for(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

/// How the drain phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// In-flight work finished inside the grace period.
    Completed,
    /// The grace period ran out first.
    TimedOut,
}

impl DrainOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> u8 {
        match self {
            DrainOutcome::Completed => 0,
            DrainOutcome::TimedOut => 1,
        }
    }
}

/// Wait for `in_flight` to finish, giving up after `grace`.
pub async fn drain<F>(in_flight: F, grace: Duration) -> DrainOutcome
where
    F: Future,
{
    match tokio::time::timeout(grace, in_flight).await {
        Ok(_) => DrainOutcome::Completed,
        Err(_) => {
            tracing::error!(grace_secs = grace.as_secs_f64(), "Drain deadline exceeded");
            DrainOutcome::TimedOut
        }
    }
}
