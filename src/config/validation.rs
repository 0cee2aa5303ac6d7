//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, timeouts > 0)
//! - Reject empty paths before anything touches the filesystem
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("files.root_dir must not be empty")]
    EmptyRootDir,

    #[error("listener.host must not be empty")]
    EmptyHost,

    #[error("rate_limit.window_ms must be greater than zero when rate limiting is enabled")]
    ZeroRateWindow,

    #[error("rate_limit.max_requests must be greater than zero; set rate_limit.enabled = false to turn limiting off")]
    ZeroRateLimitMax,

    #[error("shutdown.drain_timeout_secs must be greater than zero")]
    ZeroDrainTimeout,

    #[error("access_log.path must not be empty")]
    EmptyAccessLogPath,

    #[error("observability.metrics_address is not a socket address: {0}")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.files.root_dir.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyRootDir);
    }
    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.rate_limit.enabled && config.rate_limit.window_ms == 0 {
        errors.push(ValidationError::ZeroRateWindow);
    }
    if config.rate_limit.enabled && config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroRateLimitMax);
    }
    if config.shutdown.drain_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDrainTimeout);
    }
    if config.access_log.path.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyAccessLogPath);
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
