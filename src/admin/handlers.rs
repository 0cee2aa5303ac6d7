use std::fmt::Write as _;
use std::io::ErrorKind;

use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
};
use html_escape::encode_text;

use crate::files::listing::LISTING_STYLESHEET;
use crate::http::response::internal_error;
use crate::http::server::AppState;

/// Most recent lines shown by the viewer.
pub const MAX_VIEWER_LINES: usize = 1000;

/// One parsed access log line.
#[derive(Debug, PartialEq, Eq)]
pub struct LogRow<'a> {
    pub timestamp: &'a str,
    pub client: &'a str,
    pub request: &'a str,
    pub user_agent: &'a str,
}

impl<'a> LogRow<'a> {
    /// Split a line on its ` | ` separators; the user agent keeps any extra pipes.
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut parts = line.splitn(4, " | ");
        let timestamp = parts.next()?;
        let client = parts.next()?;
        let request = parts.next()?;
        let user_agent = parts.next().unwrap_or("");
        Some(Self {
            timestamp,
            client: client.strip_prefix("IP: ").unwrap_or(client),
            request,
            user_agent,
        })
    }
}

pub async fn view_logs(State(state): State<AppState>) -> Response {
    let contents = match tokio::fs::read_to_string(&state.access_log_path).await {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => {
            tracing::error!(
                path = %state.access_log_path.display(),
                error = %e,
                "Failed to read access log"
            );
            return internal_error();
        }
    };

    Html(render_log_page(&contents)).into_response()
}

pub fn render_log_page(contents: &str) -> String {
    let lines: Vec<&str> = contents.lines().filter(|l| !l.trim().is_empty()).collect();
    let shown = &lines[lines.len().saturating_sub(MAX_VIEWER_LINES)..];

    let mut html = String::with_capacity(512 + shown.len() * 200);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Access log</title>\n<link rel=\"stylesheet\" href=\"{LISTING_STYLESHEET}\">\n\
         </head>\n<body class=\"logs\">\n<div id=\"wrapper\">\n<h1>Access log</h1>\n\
         <p class=\"warning\">Debug view without authentication. Not for production use.</p>\n\
         <p>Showing {} of {} entries.</p>\n<table id=\"logs\">\n\
         <thead><tr><th>Time</th><th>Client</th><th>Request</th><th>User agent</th></tr></thead>\n<tbody>\n",
        shown.len(),
        lines.len()
    );

    for line in shown {
        match LogRow::parse(line) {
            Some(row) => {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    encode_text(row.timestamp),
                    encode_text(row.client),
                    encode_text(row.request),
                    encode_text(row.user_agent)
                );
            }
            None => {
                let _ = writeln!(
                    html,
                    "<tr><td colspan=\"4\">{}</td></tr>",
                    encode_text(line)
                );
            }
        }
    }

    html.push_str("</tbody>\n</table>\n</div>\n</body>\n</html>\n");
    html
}
