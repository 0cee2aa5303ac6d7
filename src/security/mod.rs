//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (stamp security headers on the eventual response)
//!     → rate_limit.rs (check per-client window, may answer 429)
//!     → Pass to file resolution
//! ```
//!
//! # Design Decisions
//! - Headers are applied outside the limiter so 429s carry them too
//! - Fail closed: rejected requests still consume the client's window
//! - No authentication: every file under the root is public

pub mod headers;
pub mod rate_limit;

pub use headers::security_headers_middleware;
pub use rate_limit::{rate_limit_middleware, RateLimiter, RateWindow, Verdict};
