//! Anti-abuse protection for the comment channel
//!
//! - Blocks curl/wget style user agents on the WebSocket upgrade
//! - Requires browser WebSocket headers (Origin + Sec-WebSocket-Key)
//! - Rate limits upgrades per session token, and comments per connection

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

/// Sec-WebSocket-Key header (browsers always send this for WS upgrades)
const SEC_WEBSOCKET_KEY: &str = "sec-websocket-key";

/// Fixed-window rate limiter keyed by arbitrary strings
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Map of key to (request count, window start)
    requests: Arc<RwLock<HashMap<String, (u32, Instant)>>>,
    /// Maximum requests per window
    max_requests: u32,
    /// Time window duration
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(10))
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Returns true if allowed, false if rate limited
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        match requests.get_mut(key) {
            Some((count, window_start)) => {
                if now.duration_since(*window_start) >= self.window {
                    *count = 1;
                    *window_start = now;
                    true
                } else if *count >= self.max_requests {
                    false
                } else {
                    *count += 1;
                    true
                }
            }
            None => {
                requests.insert(key.to_string(), (1, now));
                true
            }
        }
    }

    /// Forget a key, e.g. when its connection closes
    pub async fn forget(&self, key: &str) {
        self.requests.write().await.remove(key);
    }

    /// Drop stale entries (called periodically)
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, (_, window_start)| now.duration_since(*window_start) < self.window * 2);
    }

    pub async fn tracked_keys(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[derive(Debug, Clone)]
pub struct AbuseConfig {
    pub block_user_agents: bool,
    /// Require Origin + Sec-WebSocket-Key on upgrades
    pub require_browser_headers: bool,
    /// Upgrade rate limiter (None = disabled)
    pub rate_limiter: Option<RateLimiter>,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            block_user_agents: true,
            require_browser_headers: true,
            rate_limiter: Some(RateLimiter::default()),
        }
    }
}

impl AbuseConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let block_user_agents = std::env::var("ABUSE_BLOCK_USER_AGENTS")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true);

        let require_browser_headers = std::env::var("ABUSE_REQUIRE_BROWSER")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true);

        let rate_limit_enabled = std::env::var("ABUSE_RATE_LIMIT")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true);

        let rate_limiter = if rate_limit_enabled {
            let max_requests = std::env::var("ABUSE_RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100);

            let window_secs = std::env::var("ABUSE_RATE_LIMIT_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10);

            Some(RateLimiter::new(
                max_requests,
                Duration::from_secs(window_secs),
            ))
        } else {
            None
        };

        tracing::info!(
            block_user_agents,
            require_browser_headers,
            rate_limit_enabled,
            "Anti-abuse config loaded"
        );

        Self {
            block_user_agents,
            require_browser_headers,
            rate_limiter,
        }
    }
}

/// Check if a user agent looks like a bot/CLI tool
fn is_blocked_user_agent(user_agent: &str) -> bool {
    let ua_lower = user_agent.to_lowercase();
    if ua_lower.contains("curl")
        || ua_lower.contains("wget")
        || ua_lower.contains("httpie")
        || ua_lower.contains("python-requests")
        || ua_lower.contains("python-urllib")
        || ua_lower.contains("libwww-perl")
        || ua_lower.contains("go-http-client")
        || ua_lower.contains("java/")
    {
        return true;
    }

    // "bot" as a word boundary, not substring
    ua_lower.ends_with("bot")
        || ua_lower.contains("bot/")
        || ua_lower.contains("bot ")
        || ua_lower.contains("spider")
        || ua_lower.contains("crawler")
}

/// Session token from the query string; anonymous upgrades are not limited
fn get_rate_limit_key(request: &Request<Body>) -> Option<String> {
    request.uri().query().and_then(|query| {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
            .filter(|token| !token.is_empty())
            .map(|token| format!("token:{}", token))
    })
}

fn forbidden(message: &'static str) -> Response<Body> {
    (StatusCode::FORBIDDEN, message).into_response()
}

fn rate_limited() -> Response<Body> {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, "10")],
        "Rate limit exceeded. Please slow down.",
    )
        .into_response()
}

/// Browsers always send both Sec-WebSocket-Key and Origin
fn is_browser_websocket(request: &Request<Body>) -> bool {
    request.headers().contains_key(SEC_WEBSOCKET_KEY) && request.headers().contains_key(header::ORIGIN)
}

/// Middleware for anti-abuse protection on the comment WebSocket endpoint
pub async fn ws_abuse_middleware(
    State(config): State<Arc<AbuseConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if config.block_user_agents {
        match request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|ua| ua.to_str().ok())
        {
            Some(ua) if is_blocked_user_agent(ua) => {
                tracing::warn!(user_agent = ua, "Blocked suspicious user agent");
                return forbidden("Access denied");
            }
            Some(_) => {}
            None => {
                tracing::warn!("Blocked request with no User-Agent");
                return forbidden("Access denied");
            }
        }
    }

    if config.require_browser_headers && !is_browser_websocket(&request) {
        tracing::warn!(
            uri = %request.uri(),
            has_origin = request.headers().contains_key(header::ORIGIN),
            has_ws_key = request.headers().contains_key(SEC_WEBSOCKET_KEY),
            "Blocked non-browser WebSocket request"
        );
        return forbidden("Access denied");
    }

    if let (Some(rate_limiter), Some(key)) = (&config.rate_limiter, get_rate_limit_key(&request)) {
        if !rate_limiter.check(&key).await {
            tracing::warn!(key, "Rate limited");
            return rate_limited();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_user_agents() {
        assert!(is_blocked_user_agent("curl/7.64.1"));
        assert!(is_blocked_user_agent("Wget/1.20.3"));
        assert!(is_blocked_user_agent("python-requests/2.25.1"));
        assert!(is_blocked_user_agent("Go-http-client/1.1"));
        assert!(is_blocked_user_agent("Googlebot/2.1"));
        assert!(is_blocked_user_agent("bingbot"));
        assert!(is_blocked_user_agent("WebCrawler/1.0"));

        assert!(!is_blocked_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
        ));
        assert!(!is_blocked_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X)"
        ));
        assert!(!is_blocked_user_agent(""));
    }

    #[test]
    fn test_rate_limit_key_from_query() {
        let request = Request::builder()
            .uri("/ws/comments?foo=1&token=abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(get_rate_limit_key(&request), Some("token:abc".to_string()));

        let request = Request::builder()
            .uri("/ws/comments?token=")
            .body(Body::empty())
            .unwrap();
        assert_eq!(get_rate_limit_key(&request), None);
    }

    #[tokio::test]
    async fn test_rate_limiter_blocks_after_max() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        for _ in 0..5 {
            assert!(limiter.check("conn").await);
        }
        assert!(!limiter.check("conn").await);
    }

    #[tokio::test]
    async fn test_rate_limiter_different_keys() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));

        assert!(limiter.check("key1").await);
        assert!(limiter.check("key1").await);
        assert!(!limiter.check("key1").await);

        assert!(limiter.check("key2").await);
        assert!(limiter.check("key2").await);
        assert!(!limiter.check("key2").await);
    }

    #[tokio::test]
    async fn test_rate_limiter_window_reset() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));

        assert!(limiter.check("key").await);
        assert!(limiter.check("key").await);
        assert!(!limiter.check("key").await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(limiter.check("key").await);
    }

    #[tokio::test]
    async fn test_rate_limiter_cleanup_and_forget() {
        let limiter = RateLimiter::new(2, Duration::from_millis(10));
        limiter.check("old").await;
        limiter.check("gone").await;
        limiter.forget("gone").await;
        assert_eq!(limiter.tracked_keys().await, 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }

    #[test]
    fn test_abuse_config_default() {
        let config = AbuseConfig::default();
        assert!(config.block_user_agents);
        assert!(config.require_browser_headers);
        assert!(config.rate_limiter.is_some());
    }
}
