//! Startup checks.
//!
//! # Responsibilities
//! - Make sure the served directory exists (creating it if needed)
//! - Bind the listening socket
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and maps to exit code 1
//! - The socket is bound last, so traffic only arrives once everything is ready

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigError, ListenerConfig};

/// Fatal problems that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot create root directory {path}: {source}")]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("root path {0} exists but is not a directory")]
    RootNotDirectory(PathBuf),

    #[error("invalid bind address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("address {0} is already in use; is another server running on this port?")]
    AddrInUse(SocketAddr),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Ensure `root` is a directory, creating it and its parents if absent.
///
/// Returns the canonical path used for all later containment checks.
pub async fn prepare_root(root: &Path) -> Result<PathBuf, StartupError> {
    match tokio::fs::metadata(root).await {
        Ok(m) if m.is_dir() => {}
        Ok(_) => return Err(StartupError::RootNotDirectory(root.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %root.display(), "Root directory missing, creating it");
            tokio::fs::create_dir_all(root)
                .await
                .map_err(|source| StartupError::CreateRoot {
                    path: root.to_path_buf(),
                    source,
                })?;
        }
        Err(source) => {
            return Err(StartupError::CreateRoot {
                path: root.to_path_buf(),
                source,
            })
        }
    }

    tokio::fs::canonicalize(root)
        .await
        .map_err(|source| StartupError::CreateRoot {
            path: root.to_path_buf(),
            source,
        })
}

/// Resolve the configured host and port to one socket address.
pub async fn resolve_address(config: &ListenerConfig) -> Result<SocketAddr, StartupError> {
    let address = config.bind_address();
    let invalid = |reason: String| StartupError::InvalidAddress {
        address: address.clone(),
        reason,
    };

    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let mut candidates = tokio::net::lookup_host(address.as_str())
        .await
        .map_err(|e| invalid(e.to_string()))?;
    candidates
        .next()
        .ok_or_else(|| invalid("host resolved to no addresses".to_string()))
}

/// Bind the listening socket.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, StartupError> {
    let address = resolve_address(config).await?;

    let listener = TcpListener::bind(address).await.map_err(|source| {
        if source.kind() == ErrorKind::AddrInUse {
            StartupError::AddrInUse(address)
        } else {
            StartupError::Bind { address, source }
        }
    })?;

    tracing::info!(address = %address, "Listener bound");
    Ok(listener)
}
