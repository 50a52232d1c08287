//! Per-relay URL rate limiting: one token bucket per relay, created lazily on first use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// A single relay's token bucket. Continuously refilled rather than reset on a fixed tick, so
/// `acquire` converges to the configured rate under contention instead of bursting once per
/// tick.
struct TokenBucket {
    capacity: f64,
    rate_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, rate_per_sec: f64) -> Self {
        Self {
            capacity,
            rate_per_sec,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn seconds_until_next_token(&self) -> f64 {
        if self.rate_per_sec <= 0.0 {
            return f64::INFINITY;
        }
        ((1.0 - self.tokens) / self.rate_per_sec).max(0.0)
    }
}

/// Per-URL rate limiter. One bucket is created the first time a given relay URL is seen;
/// subsequent calls for the same URL reuse it.
pub struct RelayRateLimiter {
    buckets: Mutex<HashMap<String, Arc<Mutex<TokenBucket>>>>,
    capacity: f64,
    rate_per_sec: f64,
}

impl RelayRateLimiter {
    pub fn new(capacity: f64, rate_per_sec: f64) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity,
            rate_per_sec,
        }
    }

    async fn bucket_for(&self, url: &str) -> Arc<Mutex<TokenBucket>> {
        if let Some(bucket) = self.buckets.lock().await.get(url) {
            return bucket.clone();
        }
        let mut map = self.buckets.lock().await;
        map.entry(url.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::new(self.capacity, self.rate_per_sec))))
            .clone()
    }

    /// Block until a token is available for `url`, then consume it.
    pub async fn acquire(&self, url: &str) {
        let bucket = self.bucket_for(url).await;
        loop {
            let wait = {
                let mut bucket = bucket.lock().await;
                let now = Instant::now();
                if bucket.try_take(now) {
                    return;
                }
                bucket.seconds_until_next_token()
            };
            tokio::time::sleep(Duration::from_secs_f64(wait.max(0.001))).await;
        }
    }

    /// Attempt to consume a token without blocking; `false` if none is available right now.
    pub async fn try_acquire(&self, url: &str) -> bool {
        let bucket = self.bucket_for(url).await;
        let mut bucket = bucket.lock().await;
        bucket.try_take(Instant::now())
    }

    /// `(tokens_available, capacity)` for diagnostics, without consuming a token.
    pub async fn status(&self, url: &str) -> Option<(f64, f64)> {
        let bucket = self.buckets.lock().await.get(url)?.clone();
        let mut bucket = bucket.lock().await;
        bucket.refill(Instant::now());
        Some((bucket.tokens, bucket.capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn drains_capacity_then_blocks_until_refill() {
        let limiter = RelayRateLimiter::new(2.0, 1.0);
        assert!(limiter.try_acquire("wss://a").await);
        assert!(limiter.try_acquire("wss://a").await);
        assert!(!limiter.try_acquire("wss://a").await);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire("wss://a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_urls_have_independent_buckets() {
        let limiter = RelayRateLimiter::new(1.0, 1.0);
        assert!(limiter.try_acquire("wss://a").await);
        assert!(!limiter.try_acquire("wss://a").await);
        assert!(limiter.try_acquire("wss://b").await);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_blocks_until_a_token_refills() {
        let limiter = Arc::new(RelayRateLimiter::new(1.0, 2.0));
        assert!(limiter.try_acquire("wss://a").await);

        let waiter = tokio::spawn({
            let limiter = limiter.clone();
            async move {
                limiter.acquire("wss://a").await;
            }
        });
        tokio::time::advance(Duration::from_millis(600)).await;
        waiter.await.unwrap();
    }
}
