//! Append-only access log.
//!
//! Every request yields exactly one line:
//!
//! ```text
//! 2024-05-01T12:00:00.000Z | IP: 203.0.113.7 | GET /report.txt | curl/8.5.0
//! ```
//!
//! Records go over an unbounded channel to a single writer task, so the
//! request path never waits on disk. Write failures are logged and dropped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::http::request::ClientKey;
use crate::observability::metrics;

/// One inbound request, as written to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub timestamp: DateTime<Utc>,
    pub client_key: ClientKey,
    pub method: String,
    pub url: String,
    pub user_agent: Option<String>,
}

impl AccessRecord {
    pub fn from_request<B>(request: &Request<B>, timestamp: DateTime<Utc>) -> Self {
        let url = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        Self {
            timestamp,
            client_key: ClientKey::from_request(request),
            method: request.method().to_string(),
            url,
            user_agent: request
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }

    /// The record as a complete log line, newline included.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Line breaks in client-controlled fields would split one record into two.
        let clean = |s: &str| s.replace(['\r', '\n'], " ");
        write!(
            f,
            "{} | IP: {} | {} {} | {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            clean(self.client_key.as_str()),
            self.method,
            clean(&self.url),
            clean(self.user_agent.as_deref().unwrap_or("-")),
        )
    }
}

/// Handle for submitting records. Cheap to clone.
#[derive(Clone)]
pub struct AccessRecorder {
    tx: mpsc::UnboundedSender<AccessRecord>,
}

impl AccessRecorder {
    /// Spawn the writer task appending to `path`.
    ///
    /// The task ends once every recorder clone has been dropped and the queue
    /// is drained; await the handle to flush at shutdown.
    pub fn spawn(path: PathBuf) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_records(path, rx));
        (Self { tx }, handle)
    }

    /// Queue a record. Never blocks and never fails the caller.
    pub fn record(&self, record: AccessRecord) {
        if self.tx.send(record).is_err() {
            tracing::error!("Access log writer has stopped; record dropped");
        }
    }
}

async fn open_log(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path).await
}

async fn write_records(path: PathBuf, mut rx: mpsc::UnboundedReceiver<AccessRecord>) {
    let mut file: Option<File> = None;

    while let Some(record) = rx.recv().await {
        if file.is_none() {
            match open_log(&path).await {
                Ok(f) => file = Some(f),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to open access log");
                    metrics::record_access_log_error();
                    continue;
                }
            }
        }

        let Some(f) = file.as_mut() else { continue };
        let line = record.to_line();
        // tokio buffers file writes internally; flush so readers see whole lines.
        let written = match f.write_all(line.as_bytes()).await {
            Ok(()) => f.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::error!(path = %path.display(), error = %e, "Failed to write access log");
            metrics::record_access_log_error();
            // Reopen on the next record.
            file = None;
        }
    }

    tracing::debug!(path = %path.display(), "Access log writer stopped");
}

/// Outermost middleware: records the request before anything can reject it.
pub async fn access_log_middleware(
    State(recorder): State<AccessRecorder>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    recorder.record(AccessRecord::from_request(&request, Utc::now()));

    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(ua: Option<&str>) -> AccessRecord {
        AccessRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            client_key: ClientKey::new("203.0.113.7"),
            method: "GET".to_string(),
            url: "/report.txt?x=1".to_string(),
            user_agent: ua.map(str::to_string),
        }
    }

    #[test]
    fn test_line_format() {
        assert_eq!(
            record(Some("curl/8.5.0")).to_string(),
            "2024-05-01T12:00:00.000Z | IP: 203.0.113.7 | GET /report.txt?x=1 | curl/8.5.0"
        );
    }

    #[test]
    fn test_missing_user_agent_renders_dash() {
        assert!(record(None).to_string().ends_with("| -"));
    }

    #[test]
    fn test_newlines_cannot_forge_records() {
        let line = record(Some("evil\nGET / | x")).to_line();
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_from_request_keeps_query() {
        let request = Request::builder()
            .method("HEAD")
            .uri("/docs/a.txt?download=1")
            .header(header::USER_AGENT, "tester")
            .header("x-forwarded-for", "198.51.100.2")
            .body(Body::empty())
            .unwrap();

        let rec = AccessRecord::from_request(&request, Utc::now());
        assert_eq!(rec.method, "HEAD");
        assert_eq!(rec.url, "/docs/a.txt?download=1");
        assert_eq!(rec.client_key.as_str(), "198.51.100.2");
        assert_eq!(rec.user_agent.as_deref(), Some("tester"));
    }

    #[tokio::test]
    async fn test_writer_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        std::fs::write(&path, "existing line\n").unwrap();

        let (recorder, handle) = AccessRecorder::spawn(path.clone());
        for _ in 0..3 {
            recorder.record(record(Some("ua")));
        }
        drop(recorder);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "existing line");
        assert!(lines[1..].iter().all(|l| l.contains("| IP: 203.0.113.7 |")));
    }

    #[tokio::test]
    async fn test_unwritable_path_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("access.log");

        let (recorder, handle) = AccessRecorder::spawn(path.clone());
        recorder.record(record(None));
        drop(recorder);
        handle.await.unwrap();

        assert!(!path.exists());
    }
}
