//! # Retry Rate Limiting
//!
//! Two independent mechanisms decide how long a failed key waits before its
//! next attempt: a per-key exponential backoff and a global token bucket that
//! bounds total retry throughput across all keys. They compose behind one
//! trait via [`MaxOfRateLimiter`], so either can be swapped or tested in
//! isolation; [`FixedDelayLimiter`] gives tests a deterministic stand-in.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Strategy deciding how long a key must wait before being retried.
pub trait RateLimiter: Send + Sync {
    /// Delay before the key's next attempt. Calling this counts as a failure
    /// for limiters that track per-key state.
    fn when(&self, key: &str) -> Duration;

    /// Clear any per-key state after a successful pass.
    fn forget(&self, key: &str);

    /// Failures recorded for the key so far.
    fn retries(&self, key: &str) -> u32;
}

/// Per-key exponential backoff: `base * 2^failures`, capped.
pub struct ItemExponentialBackoff {
    base: Duration,
    cap: Duration,
    failures: Mutex<HashMap<String, u32>>,
}

impl ItemExponentialBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            failures: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for ItemExponentialBackoff {
    fn when(&self, key: &str) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.entry(key.to_string()).or_insert(0);
        let exponent = (*count).min(63);
        *count += 1;

        let delay = self.base.as_secs_f64() * 2f64.powi(exponent as i32);
        Duration::from_secs_f64(delay.min(self.cap.as_secs_f64()))
    }

    fn forget(&self, key: &str) {
        self.failures.lock().remove(key);
    }

    fn retries(&self, key: &str) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Global token bucket shared across all keys. Bounds overall retry
/// throughput independent of per-key state.
pub struct TokenBucketLimiter {
    qps: f64,
    burst: u32,
    state: Mutex<BucketState>,
}

impl TokenBucketLimiter {
    pub fn new(qps: f64, burst: u32) -> Self {
        Self {
            qps,
            burst,
            state: Mutex::new(BucketState {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
        }
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn when(&self, _key: &str) -> Duration {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.qps).min(f64::from(self.burst));
        state.last_refill = now;

        state.tokens -= 1.0;
        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / self.qps)
        }
    }

    fn forget(&self, _key: &str) {}

    fn retries(&self, _key: &str) -> u32 {
        0
    }
}

/// Combines limiters by taking the worst (longest) answer, so both per-key
/// backoff and the global bucket are always honored.
pub struct MaxOfRateLimiter {
    limiters: Vec<Box<dyn RateLimiter>>,
}

impl MaxOfRateLimiter {
    pub fn new(limiters: Vec<Box<dyn RateLimiter>>) -> Self {
        Self { limiters }
    }
}

impl RateLimiter for MaxOfRateLimiter {
    fn when(&self, key: &str) -> Duration {
        self.limiters
            .iter()
            .map(|l| l.when(key))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(&self, key: &str) {
        for limiter in &self.limiters {
            limiter.forget(key);
        }
    }

    fn retries(&self, key: &str) -> u32 {
        self.limiters
            .iter()
            .map(|l| l.retries(key))
            .max()
            .unwrap_or(0)
    }
}

/// Deterministic limiter for tests: always the same delay.
pub struct FixedDelayLimiter {
    delay: Duration,
    failures: Mutex<HashMap<String, u32>>,
}

impl FixedDelayLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            failures: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for FixedDelayLimiter {
    fn when(&self, key: &str) -> Duration {
        *self.failures.lock().entry(key.to_string()).or_insert(0) += 1;
        self.delay
    }

    fn forget(&self, key: &str) {
        self.failures.lock().remove(key);
    }

    fn retries(&self, key: &str) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }
}
