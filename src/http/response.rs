//! Response construction and error mapping.
//!
//! # Responsibilities
//! - Stream resolved files with type, length and caching headers
//! - Render directory listings
//! - Map resolution errors to status codes without leaking details
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire files
//! - Client errors (404) are not logged as faults; I/O failures are

use std::any::Any;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::io::ReaderStream;

use crate::files::{Resolution, ServedFile};

/// Errors raised while answering a file request.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("not found")]
    NotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for FileError {
    fn into_response(self) -> Response {
        match self {
            FileError::NotFound => not_found(),
            FileError::Io(e) => {
                tracing::error!(error = %e, "File request failed");
                internal_error()
            }
        }
    }
}

pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

pub fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Turn a resolution into the final response.
pub async fn resolution_response(
    resolution: Resolution,
    cache_max_age: Duration,
) -> Result<Response, FileError> {
    match resolution {
        Resolution::File(file) => file_response(file, cache_max_age).await,
        Resolution::Directory(listing) => Ok(Html(listing.render_html()).into_response()),
        Resolution::NotFound => Err(FileError::NotFound),
    }
}

async fn file_response(file: ServedFile, cache_max_age: Duration) -> Result<Response, FileError> {
    let handle = tokio::fs::File::open(&file.path).await?;
    let body = Body::from_stream(ReaderStream::new(handle));

    let mime = mime_guess::from_path(&file.path)
        .first_or_octet_stream()
        .to_string();

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&mime) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file.len));
    if let Ok(value) = HeaderValue::from_str(&cache_control(cache_max_age)) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Some(value) = file
        .modified
        .map(http_date)
        .and_then(|d| HeaderValue::from_str(&d).ok())
    {
        headers.insert(header::LAST_MODIFIED, value);
    }

    tracing::debug!(path = %file.path.display(), bytes = file.len, "Streaming file");
    Ok(response)
}

pub fn cache_control(max_age: Duration) -> String {
    format!("public, max-age={}", max_age.as_secs())
}

fn http_date(time: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Terminal fault handler: logs the panic payload, answers a bare 500.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "Request handler panicked");
    internal_error()
}
