//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Prepare root dir → Bind listener
//!
//! Serving (this module):
//!     Spawn server → phase = Serving → wait for signal
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → phase = Draining → stop accepting
//!     → drain in-flight requests (bounded) → Stopped, or forced exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then filesystem, then listener
//! - Shutdown has timeout: forced exit after deadline

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::http::HttpServer;

pub use shutdown::{DrainOutcome, Shutdown};
pub use startup::StartupError;
pub use state::{Phase, PhaseTracker};

/// Serve until `signal` resolves, then drain within `grace`.
///
/// Returns an error if the server stopped on its own before any signal.
pub async fn run<S>(
    server: HttpServer,
    listener: TcpListener,
    phase: PhaseTracker,
    grace: Duration,
    signal: S,
) -> Result<DrainOutcome, std::io::Error>
where
    S: Future<Output = ()>,
{
    let shutdown = Shutdown::new();
    let mut serving = tokio::spawn(server.run(listener, shutdown.subscribe()));
    phase.advance(Phase::Serving);

    tokio::select! {
        _ = signal => {}
        finished = &mut serving => {
            phase.advance(Phase::Stopped);
            return match finished {
                Ok(Ok(())) => Err(std::io::Error::other("server stopped unexpectedly")),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(std::io::Error::other(e)),
            };
        }
    }

    phase.advance(Phase::Draining);
    shutdown.trigger();
    tracing::info!(grace_secs = grace.as_secs(), "Draining in-flight requests");

    let outcome = shutdown::drain(&mut serving, grace).await;
    match outcome {
        DrainOutcome::Completed => {
            phase.advance(Phase::Stopped);
        }
        DrainOutcome::TimedOut => serving.abort(),
    }
    Ok(outcome)
}
