//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → access_log.rs (one line per request, append-only file)
//!     → metrics.rs (counters, histograms)
//!
//! All subsystems:
//!     → logging.rs (structured console events via tracing)
//! ```
//!
//! # Design Decisions
//! - The access log is a product feature (read by /admin/logs), console
//!   logging is operational; they never share a sink
//! - Access log writes happen off the request path
//! - Metrics are cheap (atomic increments)

pub mod access_log;
pub mod logging;
pub mod metrics;

pub use access_log::{access_log_middleware, AccessRecord, AccessRecorder};
