//! # Rate Limiter
//!
//! One clock for the whole process. Every model call, regardless of
//! which task issues it, acquires this limiter first, so the provider
//! never sees two calls closer together than the configured interval.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug)]
struct ClockState {
    last_call: Option<Instant>,
    /// Set after a rate-limit signal; the next acquisition waits the
    /// extended cooldown instead of the normal interval, then clears.
    cooling_down: bool,
}

pub struct RateLimiter {
    state: Mutex<ClockState>,
    min_interval: Duration,
    cooldown: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(ClockState {
                last_call: None,
                cooling_down: false,
            }),
            min_interval,
            cooldown,
        }
    }

    /// Blocks until enough time has passed since the previous call,
    /// then stamps the clock. The lock is held across the sleep so
    /// concurrent callers serialize on a single writer.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        let required = if state.cooling_down {
            self.cooldown
        } else {
            self.min_interval
        };
        if let Some(last) = state.last_call {
            let elapsed = last.elapsed();
            if elapsed < required {
                let wait = required - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "pacing next model call");
                tokio::time::sleep(wait).await;
            }
        }
        state.last_call = Some(Instant::now());
        state.cooling_down = false;
    }

    /// Records a provider throttling signal. The next `acquire` waits
    /// the extended cooldown.
    pub async fn note_rate_limited(&self) {
        let mut state = self.state.lock().await;
        state.cooling_down = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_acquire_does_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(60), Duration::from_secs(120));
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_sequential_calls_respect_min_interval() {
        let min = Duration::from_millis(30);
        let limiter = RateLimiter::new(min, Duration::from_millis(200));
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= min);
    }

    #[tokio::test]
    async fn test_concurrent_callers_serialize_on_one_clock() {
        let min = Duration::from_millis(25);
        let limiter = Arc::new(RateLimiter::new(min, Duration::from_millis(200)));
        let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            let stamps = Arc::clone(&stamps);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                stamps.lock().unwrap().push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut stamps = stamps.lock().unwrap().clone();
        stamps.sort();
        for pair in stamps.windows(2) {
            // Small tolerance for timer slop on loaded runners.
            assert!(pair[1] - pair[0] >= min - Duration::from_millis(2));
        }
    }

    #[tokio::test]
    async fn test_rate_limit_signal_extends_next_wait() {
        let limiter = RateLimiter::new(Duration::from_millis(10), Duration::from_millis(80));
        limiter.acquire().await;
        limiter.note_rate_limited().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(70));

        // Cooldown applies once, then the normal interval returns.
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(60));
    }
}
