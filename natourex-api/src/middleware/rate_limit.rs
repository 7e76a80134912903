/// Rate limiting middleware for `/api` paths
///
/// Each client IP may make `max_requests` requests per rolling window
/// (100 per hour by default). State is process-local: a sliding log of
/// request instants per IP behind a mutex. A background task prunes idle
/// entries until the shutdown token is cancelled.
///
/// # Headers
///
/// Responses on `/api` paths include:
/// - `X-RateLimit-Limit`: Requests allowed per window
/// - `X-RateLimit-Remaining`: Requests left in the current window
/// - `X-RateLimit-Reset`: Seconds until the oldest counted request expires
/// - `Retry-After`: Seconds to wait (429 responses only)
///
/// Limited requests get a plain-text 429 response.
///
/// # Example
///
/// ```
/// use natourex_api::middleware::rate_limit::{RateLimitDecision, RateLimiter};
/// use std::net::{IpAddr, Ipv4Addr};
/// use std::time::{Duration, Instant};
///
/// let limiter = RateLimiter::new(2, Duration::from_secs(3600));
/// let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
/// let now = Instant::now();
///
/// assert!(limiter.check_at(ip, now).is_allowed());
/// assert!(limiter.check_at(ip, now).is_allowed());
/// assert!(!limiter.check_at(ip, now).is_allowed());
/// ```

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::AppState;

/// Body of 429 responses
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again in an hour!";

/// Path prefix the limiter applies to
pub const LIMITED_PREFIX: &str = "/api";

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request counted
    Allowed { remaining: u32, reset_after: Duration },

    /// Window full
    Limited { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Sliding-window limiter keyed by client IP
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    hits: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, VecDeque<Instant>>> {
        // Entries stay consistent even if a holder panicked
        self.hits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn check(&self, ip: IpAddr) -> RateLimitDecision {
        self.check_at(ip, Instant::now())
    }

    /// Counts a request made at `now` unless the window is full
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> RateLimitDecision {
        let mut hits = self.lock();
        let log = hits.entry(ip).or_default();
        expire(log, now, self.window);

        if log.len() >= self.max_requests as usize {
            let retry_after = log
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return RateLimitDecision::Limited { retry_after };
        }

        log.push_back(now);
        let reset_after = log
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(self.window);

        RateLimitDecision::Allowed {
            remaining: self.max_requests - log.len() as u32,
            reset_after,
        }
    }

    /// Drops expired instants and IPs with nothing left in the window
    pub fn prune(&self, now: Instant) {
        let mut hits = self.lock();
        hits.retain(|_, log| {
            expire(log, now, self.window);
            !log.is_empty()
        });
    }

    /// Number of IPs currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Prunes periodically until `shutdown` is cancelled
    pub fn spawn_pruner(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let period = self.window.min(Duration::from_secs(60)).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Rate limiter pruning stopped");
                        break;
                    }
                    _ = interval.tick() => self.prune(Instant::now()),
                }
            }
        })
    }
}

fn expire(log: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = log.front() {
        if now.duration_since(*oldest) >= window {
            log.pop_front();
        } else {
            break;
        }
    }
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn insert_seconds(headers: &mut HeaderMap, name: &'static str, value: u64) {
    headers.insert(name, HeaderValue::from(value));
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Rate limiting middleware
///
/// Requests outside `/api` pass through uncounted.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !request.uri().path().starts_with(LIMITED_PREFIX) {
        return next.run(request).await;
    }

    let ip = client_ip(&request);
    let limiter = &state.rate_limiter;

    match limiter.check(ip) {
        RateLimitDecision::Limited { retry_after } => {
            tracing::warn!(client_ip = %ip, "Rate limit exceeded");

            let mut response = (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response();
            let headers = response.headers_mut();
            insert_seconds(headers, "x-ratelimit-limit", u64::from(limiter.max_requests()));
            insert_seconds(headers, "x-ratelimit-remaining", 0);
            insert_seconds(headers, "x-ratelimit-reset", ceil_secs(retry_after));
            headers.insert(header::RETRY_AFTER, HeaderValue::from(ceil_secs(retry_after)));
            response
        }
        RateLimitDecision::Allowed {
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            insert_seconds(headers, "x-ratelimit-limit", u64::from(limiter.max_requests()));
            insert_seconds(headers, "x-ratelimit-remaining", u64::from(remaining));
            insert_seconds(headers, "x-ratelimit-reset", ceil_secs(reset_after));
            response
        }
    }
}
