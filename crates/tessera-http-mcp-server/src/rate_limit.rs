//! Process-wide token-bucket rate limiter.

use std::time::Instant;

use parking_lot::Mutex;

use crate::config::RateLimitConfig;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket shared by all connections. When a request cannot take a
/// token the transport answers 429 with a `Retry-After` hint.
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            bucket: Mutex::new(Bucket {
                tokens: config.burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token. Returns `Err(retry_after_seconds)` when exhausted.
    pub fn try_acquire(&self) -> Result<(), u64> {
        let mut bucket = self.bucket.lock();
        let elapsed = bucket.last_refill.elapsed().as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.requests_per_second)
            .min(self.config.burst);
        bucket.last_refill = Instant::now();

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - bucket.tokens;
            let wait = deficit / self.config.requests_per_second;
            Err(wait.ceil().max(1.0) as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_second: 1.0,
            burst: 3.0,
        });
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());

        let retry_after = limiter.try_acquire().unwrap_err();
        assert!(retry_after >= 1);
    }

    #[test]
    fn test_refill_over_time() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_second: 1000.0,
            burst: 1.0,
        });
        assert!(limiter.try_acquire().is_ok());
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(limiter.try_acquire().is_ok());
    }
}
