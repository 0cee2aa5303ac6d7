//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, interceptor chain)
//!     → request.rs (request ID, client key)
//!     → [files module resolves the path]
//!     → response.rs (stream file, render listing, map errors)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{ClientKey, RequestIdGenerator, X_REQUEST_ID};
pub use response::FileError;
pub use server::{AppState, HttpServer};
