//! Fixed-window rate limiting keyed by route class and client identity.
//!
//! Buckets live in one shared in-memory map guarded by a write lock, so
//! concurrent checks for the same key are linearizable: two in-flight requests
//! can never both claim the last remaining slot. Keys are strings of the form
//! `class:client` (e.g. `login:203.0.113.7`), built with [`key_for`].
//!
//! Fixed windows trade precision at window boundaries (up to 2x burst) for
//! O(1) memory and time per check, which matches the contract the admin
//! tooling reports quota against. Buckets are created lazily and removed by a
//! periodic sweep ([`sweep_task`]) instead of per-request bookkeeping.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::RwLock;

/// A named quota: at most `max_requests` per `window`.
///
/// Policies are configuration, not limiter logic; the store itself is
/// policy-agnostic and applies whatever the caller passes.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self { max_requests, window: Duration::from_secs(window_seconds) }
    }
}

/// The outcome of a single `check` call.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// The configured ceiling, echoed for the X-RateLimit-Limit header.
    pub limit: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// Seconds a denied caller should wait before retrying.
    pub fn retry_after_seconds(&self) -> u64 {
        // Round up so "retry after 0 seconds" never appears on a denial.
        self.reset_after.as_secs().max(1)
    }
}

struct Bucket {
    count: u32,
    window_start: Instant,
    /// Window the bucket was last checked under; only used by the sweep.
    window: Duration,
}

/// Builds the canonical bucket key for a route class and client identity.
pub fn key_for(class: &str, client: &str) -> String {
    format!("{}:{}", class, client)
}

/// A thread-safe fixed-window rate limiter over string keys.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, Bucket>>>,
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

    /// Records one request for `key` under `policy` and decides whether it is
    /// admitted. Never fails; an unknown key is a fresh bucket.
    pub async fn check(&self, key: &str, policy: RateLimitPolicy) -> RateLimitDecision {
        let now = Instant::now();
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket { count: 0, window_start: now, window: policy.window });

        // Expired window: start a fresh one. checked_duration_since keeps the
        // bucket on time skew rather than incorrectly re-opening the quota.
        let elapsed = now.checked_duration_since(bucket.window_start).unwrap_or(Duration::ZERO);
        if elapsed > policy.window {
            bucket.count = 0;
            bucket.window_start = now;
        }
        bucket.window = policy.window;
        bucket.count = bucket.count.saturating_add(1);

        let elapsed = now.checked_duration_since(bucket.window_start).unwrap_or(Duration::ZERO);
        RateLimitDecision {
            allowed: bucket.count <= policy.max_requests,
            remaining: policy.max_requests.saturating_sub(bucket.count),
            limit: policy.max_requests,
            reset_after: policy.window.saturating_sub(elapsed),
        }
    }

    /// Clears the bucket for one exact key.
    pub async fn reset(&self, key: &str) {
        self.buckets.write().await.remove(key);
    }

    /// Clears every bucket of one route class (e.g. all `contact:*` keys).
    pub async fn reset_class(&self, class: &str) {
        let prefix = format!("{}:", class);
        self.buckets.write().await.retain(|k, _| !k.starts_with(&prefix));
    }

    /// Clears every bucket. Administrative recovery hatch.
    pub async fn reset_all(&self) {
        self.buckets.write().await.clear();
    }

    /// Removes buckets whose window has fully elapsed, bounding memory under
    /// high client-identity cardinality.
    pub async fn sweep_stale(&self) {
        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        buckets.retain(|_, b| {
            now.checked_duration_since(b.window_start).map(|d| d <= b.window).unwrap_or(true)
        });
    }

    /// Number of live buckets, exposed for diagnostics.
    pub async fn bucket_count(&self) -> usize {
        self.buckets.read().await.len()
    }
}

/// A background task that periodically sweeps stale buckets.
pub async fn sweep_task(limiter: RateLimiter, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        limiter.sweep_stale().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quota_counts_down_then_denies() {
        // 5 requests / 15 minutes against one login key
        let limiter = RateLimiter::new();
        let policy = RateLimitPolicy::new(5, 900);
        let key = key_for("login", "127.0.0.1");

        for expected_remaining in [4u32, 3, 2, 1, 0] {
            let d = limiter.check(&key, policy).await;
            assert!(d.allowed);
            assert_eq!(d.remaining, expected_remaining);
        }

        let d = limiter.check(&key, policy).await;
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert!(d.retry_after_seconds() >= 1);
    }

    #[tokio::test]
    async fn window_expiry_reopens_quota() {
        let limiter = RateLimiter::new();
        let policy = RateLimitPolicy::new(2, 1);
        let key = key_for("ip", "10.0.0.1");

        assert!(limiter.check(&key, policy).await.allowed);
        assert!(limiter.check(&key, policy).await.allowed);
        assert!(!limiter.check(&key, policy).await.allowed);

        tokio::time::sleep(Duration::from_secs(2)).await;

        let d = limiter.check(&key, policy).await;
        assert!(d.allowed);
        assert_eq!(d.remaining, 1);
    }

    #[tokio::test]
    async fn distinct_keys_are_independent() {
        let limiter = RateLimiter::new();
        let policy = RateLimitPolicy::new(1, 60);

        assert!(limiter.check("ip:127.0.0.1", policy).await.allowed);
        assert!(!limiter.check("ip:127.0.0.1", policy).await.allowed);
        // Exhausting one key never affects another
        assert!(limiter.check("ip:127.0.0.2", policy).await.allowed);
    }

    #[tokio::test]
    async fn reset_clears_one_bucket() {
        let limiter = RateLimiter::new();
        let policy = RateLimitPolicy::new(1, 60);

        assert!(limiter.check("ip:1.1.1.1", policy).await.allowed);
        assert!(!limiter.check("ip:1.1.1.1", policy).await.allowed);

        limiter.reset("ip:1.1.1.1").await;
        assert!(limiter.check("ip:1.1.1.1", policy).await.allowed);
    }

    #[tokio::test]
    async fn reset_class_clears_only_that_class() {
        let limiter = RateLimiter::new();
        let policy = RateLimitPolicy::new(1, 60);

        limiter.check("contact:1.1.1.1", policy).await;
        limiter.check("contact:2.2.2.2", policy).await;
        limiter.check("ip:1.1.1.1", policy).await;

        limiter.reset_class("contact").await;
        assert_eq!(limiter.bucket_count().await, 1);
        assert!(limiter.check("contact:1.1.1.1", policy).await.allowed);
        assert!(!limiter.check("ip:1.1.1.1", policy).await.allowed);
    }

    #[tokio::test]
    async fn reset_all_clears_everything() {
        let limiter = RateLimiter::new();
        let policy = RateLimitPolicy::new(1, 60);

        limiter.check("ip:1.1.1.1", policy).await;
        limiter.check("login:1.1.1.1", policy).await;
        limiter.reset_all().await;
        assert_eq!(limiter.bucket_count().await, 0);
    }

    #[tokio::test]
    async fn sweep_drops_expired_buckets_only() {
        let limiter = RateLimiter::new();

        limiter.check("ip:stale", RateLimitPolicy::new(5, 1)).await;
        limiter.check("ip:fresh", RateLimitPolicy::new(5, 3600)).await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        limiter.sweep_stale().await;

        assert_eq!(limiter.bucket_count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_checks_never_overadmit() {
        let limiter = RateLimiter::new();
        let policy = RateLimitPolicy::new(10, 60);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let l = limiter.clone();
            handles.push(tokio::spawn(async move { l.check("ip:racy", policy).await.allowed }));
        }

        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }
}
