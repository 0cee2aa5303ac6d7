//! Shared folder server.
//!
//! Exposes a directory tree over HTTP as browsable listings and direct
//! downloads. Read-only, unauthenticated.
//!
//! # Architecture Overview
//!
//! ```text
//!   request ──▶ access log ──▶ security headers ──▶ rate limiter ──▶ file resolver ──▶ response
//!                  │                                     │                  │
//!                  ▼                                     ▼                  ├─ file stream
//!             access.log                               429                  ├─ HTML listing
//!                                                                           └─ 404
//!
//!   lifecycle: Starting ──▶ Serving ──▶ Draining ──▶ Stopped
//! ```
//!
//! # Exit codes
//! - 0: graceful shutdown
//! - 1: fatal startup error, server failure, or drain deadline exceeded

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use folder_server::config::{loader, ServerConfig};
use folder_server::http::HttpServer;
use folder_server::lifecycle::{self, signals, startup, DrainOutcome, PhaseTracker, StartupError};
use folder_server::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "folder-server")]
#[command(about = "Serve a directory tree over HTTP with listings, rate limiting and access logs")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Root directory to serve files from (created if missing)
    #[arg(short, long, env = "ROOT_DIR")]
    root: Option<PathBuf>,

    /// Hide dotfiles from listings and direct requests
    #[arg(long, env = "HIDE_DOTFILES")]
    hide_dotfiles: Option<bool>,

    /// Access log file
    #[arg(long, env = "LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Directory served under /static
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Requests allowed per client per window
    #[arg(long, env = "RATE_LIMIT_MAX")]
    rate_limit_max: Option<u64>,

    /// Rate limit window length in milliseconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_MS")]
    rate_limit_window_ms: Option<u64>,

    /// Grace period for in-flight requests on shutdown, in seconds
    #[arg(long, env = "DRAIN_TIMEOUT_SECS")]
    drain_timeout_secs: Option<u64>,

    /// Cache-Control max-age for files, in seconds
    #[arg(long, env = "CACHE_MAX_AGE_SECS")]
    cache_max_age_secs: Option<u64>,

    /// Disable the unauthenticated /admin/logs viewer
    #[arg(long, env = "DISABLE_LOG_VIEWER")]
    disable_log_viewer: bool,

    /// Emit JSON console logs
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Config file path (optional, TOML)
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Layer command line and environment values over `config`.
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(host) = self.host {
            config.listener.host = host;
        }
        if let Some(root) = self.root {
            config.files.root_dir = root;
        }
        if let Some(hide) = self.hide_dotfiles {
            config.files.hide_dotfiles = hide;
        }
        if let Some(path) = self.log_file {
            config.access_log.path = path;
        }
        if let Some(dir) = self.static_dir {
            config.files.static_dir = dir;
        }
        if let Some(max) = self.rate_limit_max {
            config.rate_limit.max_requests = max;
        }
        if let Some(window) = self.rate_limit_window_ms {
            config.rate_limit.window_ms = window;
        }
        if let Some(secs) = self.drain_timeout_secs {
            config.shutdown.drain_timeout_secs = secs;
        }
        if let Some(secs) = self.cache_max_age_secs {
            config.files.cache_max_age_secs = secs;
        }
        if self.disable_log_viewer {
            config.admin.log_viewer_enabled = false;
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }
        config
    }
}

fn load(cli: Cli) -> Result<ServerConfig, StartupError> {
    let base = match &cli.config {
        Some(path) => loader::load_config(path)?,
        None => ServerConfig::default(),
    };
    Ok(loader::finalize(cli.apply(base))?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("folder-server: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "folder-server starting");

    let phase = PhaseTracker::new();
    match serve(config, phase).await {
        Ok(DrainOutcome::Completed) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Ok(DrainOutcome::TimedOut) => {
            tracing::error!("In-flight requests did not finish in time, forcing exit");
            // Connection tasks are still alive; skip runtime teardown.
            std::process::exit(i32::from(DrainOutcome::TimedOut.exit_code()));
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("folder-server: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(
    config: ServerConfig,
    phase: PhaseTracker,
) -> Result<DrainOutcome, Box<dyn std::error::Error>> {
    let root = startup::prepare_root(&config.files.root_dir).await?;

    tracing::info!(
        root = %root.display(),
        hide_dotfiles = config.files.hide_dotfiles,
        rate_limit_max = config.rate_limit.max_requests,
        rate_limit_window_ms = config.rate_limit.window_ms,
        access_log = %config.access_log.path.display(),
        "Configuration loaded"
    );
    if config.admin.log_viewer_enabled {
        tracing::warn!("/admin/logs is enabled and unauthenticated; disable it on untrusted networks");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = startup::bind(&config.listener).await?;
    let grace = config.shutdown.drain_timeout();
    let server = HttpServer::new(config, root, phase.clone());

    let outcome = lifecycle::run(server, listener, phase, grace, signals::termination()).await?;
    Ok(outcome)
}
