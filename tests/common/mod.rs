//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use folder_server::config::ServerConfig;
use folder_server::http::HttpServer;
use folder_server::lifecycle::{self, startup, DrainOutcome, PhaseTracker};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A server running on an ephemeral port over a scratch directory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub root: PathBuf,
    pub log_path: PathBuf,
    pub phase: PhaseTracker,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<DrainOutcome, std::io::Error>>,
    _dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Send the termination signal without waiting for the drain.
    pub fn signal(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Signal and wait for the lifecycle to finish.
    pub async fn stop(self) -> DrainOutcome {
        self.stop_with_log().await.0
    }

    /// Like `stop`, also returning the access log as it stood afterwards.
    pub async fn stop_with_log(mut self) -> (DrainOutcome, String) {
        self.signal();
        let outcome = (&mut self.handle)
            .await
            .expect("lifecycle task panicked")
            .expect("server failed");
        (outcome, self.access_log())
    }

    pub fn access_log(&self) -> String {
        std::fs::read_to_string(&self.log_path).unwrap_or_default()
    }
}

/// Start a server; the root holds `report.txt` ("hello") and `.secret` ("x").
pub async fn start_server<F>(configure: F) -> TestServer
where
    F: FnOnce(&mut ServerConfig),
{
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("sharedfolder");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("report.txt"), "hello").unwrap();
    std::fs::write(root.join(".secret"), "x").unwrap();
    std::fs::write(dir.path().join("outside.txt"), "outside the root").unwrap();

    let log_path = dir.path().join("access.log");
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.files.root_dir = root.clone();
    config.files.static_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public");
    config.access_log.path = log_path.clone();
    configure(&mut config);

    let canonical_root = startup::prepare_root(&config.files.root_dir).await.unwrap();
    let listener = startup::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let grace = config.shutdown.drain_timeout();
    let phase = PhaseTracker::new();
    let server = HttpServer::new(config, canonical_root, phase.clone());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(lifecycle::run(server, listener, phase.clone(), grace, async move {
        let _ = stop_rx.await;
    }));

    wait_until_listening(addr).await;

    TestServer {
        addr,
        root,
        log_path,
        phase,
        stop_tx: Some(stop_tx),
        handle,
        _dir: dir,
    }
}

async fn wait_until_listening(addr: SocketAddr) {
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server at {} never started listening", addr);
}

/// Client that ignores proxy env vars.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Send a request line verbatim, bypassing client-side path normalisation.
pub async fn raw_get(addr: SocketAddr, target: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

/// Poll the access log until it holds `expected` lines or give up after 2s.
pub async fn wait_for_log_lines(server: &TestServer, expected: usize) -> Vec<String> {
    for _ in 0..100 {
        let lines: Vec<String> = server.access_log().lines().map(str::to_string).collect();
        if lines.len() >= expected {
            return lines;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.access_log().lines().map(str::to_string).collect()
}

/// Bind and immediately hold a port so the server under test cannot take it.
pub async fn occupied_port() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}
