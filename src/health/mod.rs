//! Liveness endpoint.
//!
//! `GET /health` answers `200 OK` with body `OK` while the process is in the
//! Serving phase and `503` otherwise. It sits behind the access log and
//! security headers but is never rate limited.

use axum::{extract::State, http::StatusCode};

use crate::http::server::AppState;
use crate::lifecycle::Phase;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.phase.get() {
        Phase::Serving => (StatusCode::OK, "OK"),
        Phase::Starting => (StatusCode::SERVICE_UNAVAILABLE, "starting"),
        Phase::Draining | Phase::Stopped => (StatusCode::SERVICE_UNAVAILABLE, "draining"),
    }
}
