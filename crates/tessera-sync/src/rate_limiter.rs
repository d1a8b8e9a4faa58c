//! Request rate limiting for catalog traffic.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Token bucket sized to a requests-per-minute budget.
///
/// Tokens refill continuously with elapsed time rather than in discrete
/// steps, so short bursts up to the bucket capacity are allowed while the
/// sustained rate stays at the configured budget.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute` sustained requests.
    #[must_use]
    pub fn per_minute(requests_per_minute: u64) -> Self {
        let capacity = requests_per_minute.max(1) as f64;
        Self {
            capacity,
            refill_per_sec: capacity / 60.0,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Try to take one token without waiting.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        Self::refill(&mut state, self.capacity, self.refill_per_sec);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Take one token, sleeping until one is available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                Self::refill(&mut state, self.capacity, self.refill_per_sec);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                // Time until one token accrues.
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Currently available whole tokens.
    pub async fn available(&self) -> u64 {
        let mut state = self.state.lock().await;
        Self::refill(&mut state, self.capacity, self.refill_per_sec);
        state.tokens as u64
    }

    fn refill(state: &mut BucketState, capacity: f64, refill_per_sec: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * refill_per_sec).min(capacity);
        state.last_refill = now;
    }
}
