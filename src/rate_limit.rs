//! Per-address request limiting with a fixed window.
//!
//! All counters reset together when the window rolls over, so a burst that
//! straddles a boundary can get up to twice the limit through.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<Instant>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub trait RateLimiter: Send + Sync {
    /// Records one request from `addr`; `false` means it is over the limit.
    fn check(&self, addr: IpAddr) -> bool;
}

struct Window {
    started: Instant,
    counts: HashMap<IpAddr, u32>,
}

pub struct FixedWindowLimiter<C: Clock> {
    clock: C,
    max_requests: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl<C: Clock> FixedWindowLimiter<C> {
    pub fn new(clock: C, max_requests: u32, window: Duration) -> Self {
        let started = clock.now();
        Self {
            clock,
            max_requests,
            window,
            state: Mutex::new(Window {
                started,
                counts: HashMap::new(),
            }),
        }
    }
}

impl<C: Clock> RateLimiter for FixedWindowLimiter<C> {
    fn check(&self, addr: IpAddr) -> bool {
        let now = self.clock.now();
        let mut window = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.counts.clear();
        }

        let count = window.counts.entry(addr).or_insert(0);
        *count += 1;
        *count <= self.max_requests
    }
}

/// Middleware rejecting over-limit clients with 429.
pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let addr = client_addr(&request);
    if !state.limiter.check(addr) {
        tracing::warn!("Rate limit exceeded for {}", addr);
        return (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response();
    }
    next.run(request).await
}

// Requests without connection info (in-process callers) share one bucket.
fn client_addr(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
