//! Debug endpoints.
//!
//! `/admin/logs` renders the access log as HTML. It has no authentication;
//! keep `admin.log_viewer_enabled` off anywhere the log must stay private.

pub mod handlers;

use axum::{routing::get, Router};

use crate::http::server::AppState;
use self::handlers::view_logs;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/logs", get(view_logs))
}
