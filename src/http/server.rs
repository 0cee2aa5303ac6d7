//! HTTP server setup and the request pipeline.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire the interceptor chain in its fixed order
//! - Serve on a bound listener until shutdown, then flush the access log
//!
//! # Pipeline (outermost first)
//! ```text
//! request id → trace span → access log → security headers → panic guard
//!     → /health                                   (never rate limited)
//!     → rate limiter → /, /{*path}, /static, /admin/logs
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    middleware,
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::ServerConfig;
use crate::files::FileResolver;
use crate::health;
use crate::http::request::RequestIdGenerator;
use crate::http::response::{self, FileError};
use crate::lifecycle::shutdown;
use crate::lifecycle::PhaseTracker;
use crate::observability::{access_log_middleware, AccessRecorder};
use crate::security::{rate_limit, rate_limit_middleware, security_headers_middleware, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<FileResolver>,
    pub phase: PhaseTracker,
    pub access_log_path: PathBuf,
}

/// HTTP server for the shared folder.
pub struct HttpServer {
    router: Router,
    config: Arc<ServerConfig>,
    writer: JoinHandle<()>,
    sweeper: Option<JoinHandle<()>>,
}

impl HttpServer {
    /// Create a new server serving the canonical directory `root`.
    ///
    /// Spawns the access log writer and the rate window sweeper, so it must be
    /// called inside a Tokio runtime.
    pub fn new(config: ServerConfig, root: PathBuf, phase: PhaseTracker) -> Self {
        let (recorder, writer) = AccessRecorder::spawn(config.access_log.path.clone());

        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let sweeper = (limiter.is_enabled() && config.rate_limit.sweep_interval_secs > 0).then(|| {
            tokio::spawn(rate_limit::run_sweeper(
                limiter.clone(),
                std::time::Duration::from_secs(config.rate_limit.sweep_interval_secs),
            ))
        });

        let resolver = Arc::new(FileResolver::new(
            root,
            config.files.hide_dotfiles,
            std::time::Duration::from_secs(config.files.cache_max_age_secs),
        ));

        let state = AppState {
            resolver,
            phase,
            access_log_path: config.access_log.path.clone(),
        };

        let router = Self::build_router(&config, state, limiter, recorder);
        Self {
            router,
            config: Arc::new(config),
            writer,
            sweeper,
        }
    }

    /// Build the Axum router with the full interceptor chain.
    fn build_router(
        config: &ServerConfig,
        state: AppState,
        limiter: Arc<RateLimiter>,
        recorder: AccessRecorder,
    ) -> Router {
        let mut content = Router::new()
            .route("/", get(serve_root))
            .route("/{*path}", get(serve_path))
            .nest_service("/static", ServeDir::new(&config.files.static_dir));

        if config.admin.log_viewer_enabled {
            content = content.merge(admin::router());
        }

        let content = content.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));

        let routes = Router::new()
            .route("/health", get(health::health_handler))
            .merge(content)
            .with_state(state);
        Self::with_pipeline(routes, recorder)
    }

    /// Wrap `routes` in the interceptors every request passes through.
    fn with_pipeline(routes: Router, recorder: AccessRecorder) -> Router {
        routes.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(RequestIdGenerator))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::from_fn_with_state(recorder, access_log_middleware))
                .layer(middleware::from_fn(security_headers_middleware))
                .layer(CatchPanicLayer::custom(response::panic_response)),
        )
    }

    /// A clone of the fully layered router, for driving requests in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires and in-flight requests finish.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            root = %self.config.files.root_dir.display(),
            hide_dotfiles = self.config.files.hide_dotfiles,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait_for(shutdown))
            .await;

        if let Some(sweeper) = self.sweeper {
            sweeper.abort();
        }
        // Every recorder clone went away with the router, so the writer drains and exits.
        if let Err(e) = self.writer.await {
            tracing::error!(error = %e, "Access log writer failed");
        }

        tracing::info!("HTTP server stopped");
        result
    }
}

async fn serve_root(State(state): State<AppState>) -> Result<Response, FileError> {
    serve(&state, "/").await
}

async fn serve_path(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, FileError> {
    serve(&state, &path).await
}

async fn serve(state: &AppState, path: &str) -> Result<Response, FileError> {
    let resolution = state.resolver.resolve(path).await?;
    response::resolution_response(resolution, state.resolver.cache_max_age()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::http::X_REQUEST_ID;

    struct Fixture {
        _dir: tempfile::TempDir,
        server: HttpServer,
        log_path: PathBuf,
    }

    fn fixture(max_requests: u64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("share");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("report.txt"), "hello").unwrap();
        std::fs::write(root.join(".secret"), "x").unwrap();
        let log_path = dir.path().join("access.log");

        let mut config = ServerConfig::default();
        config.files.root_dir = root.clone();
        config.files.static_dir = dir.path().join("public");
        config.access_log.path = log_path.clone();
        config.rate_limit.max_requests = max_requests;

        let phase = PhaseTracker::new();
        phase.advance(crate::lifecycle::Phase::Serving);
        let server = HttpServer::new(config, root.canonicalize().unwrap(), phase);
        Fixture {
            _dir: dir,
            server,
            log_path,
        }
    }

    fn get(uri: &str, client: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", client)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_file_fetch_with_security_headers() {
        let fx = fixture(100);
        let response = fx.server.router().oneshot(get("/report.txt", "a")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(response.headers()["cache-control"], "public, max-age=600");
        assert!(response.headers().contains_key(X_REQUEST_ID));
        assert_eq!(body_string(response).await, "hello");
    }

    #[tokio::test]
    async fn test_incoming_request_id_is_echoed() {
        let fx = fixture(100);
        let mut request = get("/health", "a");
        request
            .headers_mut()
            .insert(X_REQUEST_ID, "trace-me-42".parse().unwrap());

        let response = fx.server.router().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "trace-me-42");
    }

    #[tokio::test]
    async fn test_root_listing_hides_dotfiles() {
        let fx = fixture(100);
        let response = fx.server.router().oneshot(get("/", "a")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("report.txt"));
        assert!(!html.contains(".secret"));
    }

    #[tokio::test]
    async fn test_rejected_request_keeps_headers() {
        let fx = fixture(1);
        let router = fx.server.router();
        let first = router.clone().oneshot(get("/report.txt", "a")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router.oneshot(get("/report.txt", "a")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_health_bypasses_rate_limit() {
        let fx = fixture(1);
        let router = fx.server.router();
        router.clone().oneshot(get("/", "a")).await.unwrap();

        for _ in 0..5 {
            let response = router.clone().oneshot(get("/health", "a")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, "OK");
        }
    }

    #[tokio::test]
    async fn test_missing_and_traversal_are_404() {
        let fx = fixture(100);
        let router = fx.server.router();

        let missing = router.clone().oneshot(get("/nope.txt", "a")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.headers()["referrer-policy"], "same-origin");

        let traversal = router.oneshot(get("/%2e%2e/access.log", "a")).await.unwrap();
        assert_eq!(traversal.status(), StatusCode::NOT_FOUND);
    }

    async fn exploding_handler() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained_by_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("access.log");
        let (recorder, writer) = AccessRecorder::spawn(log_path.clone());

        let routes = Router::new()
            .route("/boom", axum::routing::get(exploding_handler))
            .route("/ok", axum::routing::get(|| async { "fine" }));
        let router = HttpServer::with_pipeline(routes, recorder);

        let crashed = router.clone().oneshot(get("/boom", "a")).await.unwrap();
        assert_eq!(crashed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(crashed.headers()["x-content-type-options"], "nosniff");
        assert_eq!(crashed.headers()["x-frame-options"], "DENY");
        assert!(crashed.headers().contains_key(X_REQUEST_ID));
        let body = body_string(crashed).await;
        assert_eq!(body, "Internal Server Error");
        assert!(!body.contains("exploded"));

        let next = router.clone().oneshot(get("/ok", "a")).await.unwrap();
        assert_eq!(next.status(), StatusCode::OK);
        assert_eq!(body_string(next).await, "fine");

        drop(router);
        writer.await.unwrap();
        let log = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("| GET /boom |"));
        assert!(lines[1].contains("| GET /ok |"));
    }

    #[tokio::test]
    async fn test_every_request_is_logged_once() {
        let fx = fixture(2);
        let router = fx.server.router();
        for uri in ["/", "/report.txt", "/report.txt", "/nope", "/health"] {
            router.clone().oneshot(get(uri, "198.51.100.9")).await.unwrap();
        }
        drop(router);

        let HttpServer { router, writer, .. } = fx.server;
        drop(router);
        writer.await.unwrap();

        let log = std::fs::read_to_string(&fx.log_path).unwrap();
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].contains("| IP: 198.51.100.9 | GET /report.txt |"));
    }
}
