//! Request inspection helpers.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4)
//! - Derive the client identity used for rate limiting and access records
//!
//! # Design Decisions
//! - `X-Forwarded-For` wins over the socket peer address. The header is not
//!   verified, so any client can pick its own key; deploy behind a proxy that
//!   overwrites it if that matters.

use std::fmt;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header consulted for the originating client address.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Identity of a requester.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key from a request: first `X-Forwarded-For` entry, then
    /// the peer IP, then `unknown`.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let forwarded = request
            .headers()
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(addr) = forwarded {
            return Self::new(addr);
        }

        match request.extensions().get::<ConnectInfo<SocketAddr>>() {
            Some(ConnectInfo(addr)) => Self::new(addr.ip().to_string()),
            None => Self::new("unknown"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates a UUID v4 request ID for every request lacking one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdGenerator;

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}
