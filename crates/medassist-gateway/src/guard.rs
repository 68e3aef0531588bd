//! Request guards for `/v1/ask`: bearer-token check and per-client rate limit.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Json;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use crate::handlers::ErrorResponse;

const WINDOW: Duration = Duration::from_secs(60);
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Optional shared secret expected as `Authorization: Bearer <token>`.
#[derive(Clone)]
pub(crate) struct BearerAuth {
    expected: Option<blake3::Hash>,
}

impl BearerAuth {
    pub(crate) fn new(token: Option<&str>) -> Self {
        Self {
            expected: token.map(|t| blake3::hash(t.as_bytes())),
        }
    }

    pub(crate) fn accepts(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = self.expected else {
            return true;
        };
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or_default();
        // Digests have a fixed length, so the comparison time does not depend on the token.
        let presented = blake3::hash(presented.as_bytes());
        presented.as_bytes().ct_eq(expected.as_bytes()).into()
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed one-minute window counter keyed by client IP. A limit of zero disables it.
#[derive(Clone)]
pub(crate) struct RateLimiter {
    per_minute: u32,
    clients: Arc<Mutex<HashMap<IpAddr, Window>>>,
}

impl RateLimiter {
    pub(crate) fn new(per_minute: u32) -> Self {
        Self {
            per_minute,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request from `ip`; `Err` carries the seconds until the window resets.
    pub(crate) async fn admit(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        if self.per_minute == 0 {
            return Ok(());
        }
        let mut clients = self.clients.lock().await;
        if clients.len() >= MAX_TRACKED_CLIENTS && !clients.contains_key(&ip) {
            clients.retain(|_, w| now.duration_since(w.started) < WINDOW);
        }

        let window = clients.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= WINDOW {
            window.started = now;
            window.count = 0;
        }
        if window.count >= self.per_minute {
            let elapsed = now.duration_since(window.started);
            return Err(WINDOW.saturating_sub(elapsed).as_secs().max(1));
        }
        window.count += 1;
        Ok(())
    }
}

fn client_ip(req: &Request<Body>) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ci| ci.0.ip())
}

fn reject(status: StatusCode, error: &'static str) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

pub(crate) async fn require_token(
    State(auth): State<BearerAuth>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !auth.accepts(req.headers()) {
        tracing::debug!("rejected request with invalid bearer token");
        return reject(StatusCode::UNAUTHORIZED, "unauthorized");
    }
    next.run(req).await
}

pub(crate) async fn limit_rate(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);
    if let Err(retry_after) = limiter.admit(ip, Instant::now()).await {
        tracing::debug!(%ip, retry_after, "rate limit exceeded");
        let mut resp = reject(StatusCode::TOO_MANY_REQUESTS, "too many requests");
        resp.headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        return resp;
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bearer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn open_when_no_token_configured() {
        let auth = BearerAuth::new(None);
        assert!(auth.accepts(&HeaderMap::new()));
    }

    #[test]
    fn token_must_match_exactly() {
        let auth = BearerAuth::new(Some("s3cret"));
        assert!(auth.accepts(&bearer("Bearer s3cret")));
        assert!(!auth.accepts(&bearer("Bearer s3cre")));
        assert!(!auth.accepts(&bearer("s3cret")));
        assert!(!auth.accepts(&HeaderMap::new()));
    }

    #[tokio::test]
    async fn limiter_blocks_after_quota_and_resets() {
        let limiter = RateLimiter::new(2);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let t0 = Instant::now();

        assert!(limiter.admit(ip, t0).await.is_ok());
        assert!(limiter.admit(ip, t0).await.is_ok());
        let retry = limiter.admit(ip, t0 + Duration::from_secs(20)).await;
        assert_eq!(retry, Err(40));

        assert!(limiter.admit(ip, t0 + WINDOW).await.is_ok());
    }

    #[tokio::test]
    async fn limiter_tracks_clients_separately() {
        let limiter = RateLimiter::new(1);
        let now = Instant::now();
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        assert!(limiter.admit(a, now).await.is_ok());
        assert!(limiter.admit(a, now).await.is_err());
        assert!(limiter.admit(b, now).await.is_ok());
    }

    #[tokio::test]
    async fn zero_limit_disables() {
        let limiter = RateLimiter::new(0);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        for _ in 0..100 {
            assert!(limiter.admit(ip, Instant::now()).await.is_ok());
        }
    }
}
