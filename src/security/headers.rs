//! Security response headers.
//!
//! Every response leaving the server carries the same fixed header set,
//! including 404, 429 and 500 responses.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::{body::Body, http::Request, middleware::Next, response::Response};

/// Self-origin scripts and styles, data-URI images.
pub const CSP_POLICY: &str =
    "default-src 'self'; script-src 'self'; style-src 'self'; img-src 'self' data:";

/// The fixed header set, in the order it is applied.
pub fn security_headers() -> [(HeaderName, HeaderValue); 5] {
    [
        (
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
        (
            header::REFERRER_POLICY,
            HeaderValue::from_static("same-origin"),
        ),
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CSP_POLICY),
        ),
    ]
}

/// Stamp the security headers onto `headers`, replacing existing values.
pub fn apply_security_headers(headers: &mut HeaderMap) {
    for (name, value) in security_headers() {
        headers.insert(name, value);
    }
}

/// Middleware that stamps the security headers on whatever the inner chain returns.
pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut());
    response
}
