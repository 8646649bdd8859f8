//! Sliding-window rate limiting keyed by (route policy, client identity)
//! (spec §4.12). In-memory only — PIK runs as a single instance per spec's
//! Non-goals, so there is no distributed-bucket concern to solve here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::RoutePolicy;
use crate::error::{AuthError, AuthResult};

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, RateBucket>>>,
}

#[derive(Debug, Clone, Default)]
struct RateBucket {
    requests: Vec<Instant>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { buckets: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Checks and records one request against `policy` under `key`. `key`
    /// should already combine the route group and client identity, e.g.
    /// `"ingest:source:checkpoint-forge"` or `"auth:ip:10.0.0.4"`.
    pub async fn check(&self, key: &str, policy: RoutePolicy) -> AuthResult<()> {
        let window = Duration::from_secs(policy.window_secs);
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();

        let bucket = buckets.entry(key.to_string()).or_default();
        bucket.requests.retain(|&t| now.duration_since(t) < window);

        if bucket.requests.len() >= policy.requests_per_window as usize {
            let oldest = bucket.requests[0];
            let retry_after = window.saturating_sub(now.duration_since(oldest));
            return Err(AuthError::RateLimited { retry_after_secs: retry_after.as_secs().max(1) });
        }

        bucket.requests.push(now);
        Ok(())
    }

    /// Periodic sweep so buckets for clients that stopped sending requests
    /// don't accumulate forever. Safe to call from the same reaper tick
    /// that expires challenges and sessions.
    pub async fn sweep(&self, max_idle: Duration) {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| {
            bucket.requests.last().is_some_and(|&t| now.duration_since(t) < max_idle)
        });
    }
}

/// Extracts the client address for rate-limit keying and ledger metadata,
/// preferring proxy headers in the same order a front-end load balancer
/// typically sets them: `CF-Connecting-IP` > `X-Real-IP` >
/// `X-Forwarded-For` > the raw peer address.
pub fn extract_client_ip(
    header: impl Fn(&str) -> Option<String>,
    peer_addr: Option<std::net::SocketAddr>,
) -> String {
    header("cf-connecting-ip")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        })
        .or_else(|| peer_addr.map(|a| a.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutePolicies;

    #[tokio::test]
    async fn allows_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new();
        let policy = RoutePolicy::new(3, 60);

        for _ in 0..3 {
            assert!(limiter.check("auth:ip:1.2.3.4", policy).await.is_ok());
        }
        let result = limiter.check("auth:ip:1.2.3.4", policy).await;
        assert!(matches!(result, Err(AuthError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let policy = RoutePolicies::DEMO;

        for _ in 0..policy.requests_per_window {
            assert!(limiter.check("demo:source:a", policy).await.is_ok());
        }
        assert!(limiter.check("demo:source:a", policy).await.is_err());
        assert!(limiter.check("demo:source:b", policy).await.is_ok());
    }

    #[test]
    fn extract_client_ip_precedence() {
        let headers: HashMap<&str, &str> = [
            ("x-forwarded-for", "1.2.3.4, 5.6.7.8"),
            ("x-real-ip", "10.0.0.1"),
            ("cf-connecting-ip", "172.16.0.1"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            extract_client_ip(|k| headers.get(k).map(|s| s.to_string()), None),
            "172.16.0.1"
        );

        let headers: HashMap<&str, &str> =
            [("x-forwarded-for", "1.2.3.4, 5.6.7.8"), ("x-real-ip", "10.0.0.1")]
                .into_iter()
                .collect();
        assert_eq!(
            extract_client_ip(|k| headers.get(k).map(|s| s.to_string()), None),
            "10.0.0.1"
        );

        let headers: HashMap<&str, &str> = [("x-forwarded-for", "1.2.3.4, 5.6.7.8")].into_iter().collect();
        assert_eq!(
            extract_client_ip(|k| headers.get(k).map(|s| s.to_string()), None),
            "1.2.3.4"
        );
    }
}
