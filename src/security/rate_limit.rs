//! Per-client rate limiting with a fixed-window counter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::http::request::ClientKey;
use crate::observability::metrics;

/// Counting window for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub count: u64,
    pub window_start: Instant,
}

impl RateWindow {
    fn starting_at(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) > window
    }
}

/// Admission decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Reject,
}

/// In-memory fixed-window rate limiter keyed by [`ClientKey`].
///
/// Windows expire lazily: a request arriving after the window has elapsed
/// starts a fresh one. [`RateLimiter::sweep`] only drops windows that would be
/// reset on next access anyway.
pub struct RateLimiter {
    windows: DashMap<ClientKey, RateWindow>,
    window: Duration,
    max_requests: u64,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u64) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
            enabled: true,
        }
    }

    /// Build from configuration; `enabled = false` admits everything.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let mut limiter = Self::new(config.window(), config.max_requests);
        limiter.enabled = config.enabled;
        limiter
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Count a request from `key` at `now` and decide whether it may proceed.
    ///
    /// Rejected requests still consume the window.
    pub fn admit(&self, key: &ClientKey, now: Instant) -> Verdict {
        if !self.enabled {
            return Verdict::Allow;
        }

        // The entry guard holds the shard lock, so read-modify-write is atomic per key.
        let count = match self.windows.entry(key.clone()) {
            Entry::Vacant(vacant) => vacant.insert(RateWindow::starting_at(now)).count,
            Entry::Occupied(mut occupied) => {
                let window = occupied.get_mut();
                if window.is_expired(now, self.window) {
                    *window = RateWindow::starting_at(now);
                } else {
                    window.count += 1;
                }
                window.count
            }
        };

        if count > self.max_requests {
            Verdict::Reject
        } else {
            Verdict::Allow
        }
    }

    /// Drop every window that has expired at `now`. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.window;
        self.windows.retain(|_, w| !w.is_expired(now, window));
        before.saturating_sub(self.windows.len())
    }

    /// Number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Current window for `key`, if any.
    pub fn window_for(&self, key: &ClientKey) -> Option<RateWindow> {
        self.windows.get(key).map(|w| *w)
    }
}

/// Periodically sweep expired windows until the task is aborted.
pub async fn run_sweeper(limiter: Arc<RateLimiter>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let removed = limiter.sweep(Instant::now());
        if removed > 0 {
            tracing::debug!(
                removed,
                remaining = limiter.tracked_clients(),
                "Swept expired rate windows"
            );
        }
    }
}

/// Middleware enforcing the limiter; short-circuits with 429.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = ClientKey::from_request(&request);

    match limiter.admit(&key, Instant::now()) {
        Verdict::Allow => next.run(request).await,
        Verdict::Reject => {
            tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
            metrics::record_rate_limited();
            (StatusCode::TOO_MANY_REQUESTS, "Too many requests, please try again later.")
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ClientKey {
        ClientKey::new(s)
    }

    #[test]
    fn test_allows_up_to_max_requests() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 100);
        let now = Instant::now();
        for i in 0..100 {
            assert_eq!(limiter.admit(&key("a"), now), Verdict::Allow, "request {}", i + 1);
        }
        assert_eq!(limiter.admit(&key("a"), now), Verdict::Reject);
    }

    #[test]
    fn test_rejected_requests_still_count() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let now = Instant::now();
        limiter.admit(&key("a"), now);
        limiter.admit(&key("a"), now);
        assert_eq!(limiter.admit(&key("a"), now), Verdict::Reject);
        assert_eq!(limiter.admit(&key("a"), now), Verdict::Reject);
        assert_eq!(limiter.window_for(&key("a")).unwrap().count, 4);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let window = Duration::from_millis(1000);
        let limiter = RateLimiter::new(window, 1);
        let start = Instant::now();

        assert_eq!(limiter.admit(&key("a"), start), Verdict::Allow);
        assert_eq!(limiter.admit(&key("a"), start + window), Verdict::Reject);

        let later = start + window + Duration::from_millis(1);
        assert_eq!(limiter.admit(&key("a"), later), Verdict::Allow);
        let fresh = limiter.window_for(&key("a")).unwrap();
        assert_eq!(fresh.count, 1);
        assert_eq!(fresh.window_start, later);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        assert_eq!(limiter.admit(&key("a"), now), Verdict::Allow);
        assert_eq!(limiter.admit(&key("a"), now), Verdict::Reject);
        assert_eq!(limiter.admit(&key("b"), now), Verdict::Allow);
    }

    #[test]
    fn test_zero_budget_rejects_every_request() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 0);
        let now = Instant::now();
        assert!(limiter.is_enabled());
        assert_eq!(limiter.admit(&key("a"), now), Verdict::Reject);
        assert_eq!(limiter.admit(&key("a"), now), Verdict::Reject);
        assert_eq!(limiter.window_for(&key("a")).unwrap().count, 2);
    }

    #[test]
    fn test_disabled_limiter_allows_everything() {
        let config = RateLimitConfig {
            enabled: false,
            max_requests: 1,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::from_config(&config);
        let now = Instant::now();
        for _ in 0..10 {
            assert_eq!(limiter.admit(&key("a"), now), Verdict::Allow);
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_sweep_removes_only_expired_windows() {
        let window = Duration::from_millis(500);
        let limiter = RateLimiter::new(window, 10);
        let start = Instant::now();
        limiter.admit(&key("old"), start);
        limiter.admit(&key("new"), start + Duration::from_millis(400));

        let removed = limiter.sweep(start + Duration::from_millis(600));
        assert_eq!(removed, 1);
        assert!(limiter.window_for(&key("old")).is_none());
        assert!(limiter.window_for(&key("new")).is_some());
    }

    #[test]
    fn test_concurrent_admission_never_exceeds_limit() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), 50));
        let now = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiter.admit(&ClientKey::new("shared"), now) == Verdict::Allow)
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }
}
