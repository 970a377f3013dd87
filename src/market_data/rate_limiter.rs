// =============================================================================
// Sliding-window rate limiter — "at most N acquisitions per rolling W seconds"
// =============================================================================
//
// FIFO-fair: on `acquire()`, purge timestamps older than `now - window`; if
// the remaining set has size >= max, sleep until the oldest falls out of the
// window, then record `now`. Bounded memory: the timestamp list never grows
// past `max`. No background threads — purging happens lazily on `acquire()`,
// matching the teacher's preference (`market_data/candle_buffer.rs`, cache
// eviction in `MarketDataSource`) for lazy-on-access state over timers.
// =============================================================================

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_per_window)),
        }
    }

    /// Block (asynchronously) until a slot is available, then record the
    /// acquisition. Never holds the internal lock across a suspension point.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut ts = self.timestamps.lock();
                let now = Instant::now();
                while let Some(&front) = ts.front() {
                    if now.duration_since(front) >= self.window {
                        ts.pop_front();
                    } else {
                        break;
                    }
                }
                if ts.len() < self.max_per_window {
                    ts.push_back(now);
                    None
                } else {
                    let oldest = *ts.front().expect("len >= max_per_window > 0 implies non-empty");
                    Some(self.window - now.duration_since(oldest))
                }
            };

            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.timestamps.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquires_immediately_under_limit() {
        let rl = RateLimiter::new(3, Duration::from_millis(100));
        let start = Instant::now();
        rl.acquire().await;
        rl.acquire().await;
        rl.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(rl.in_flight(), 3);
    }

    #[tokio::test]
    async fn blocks_when_window_exhausted() {
        let rl = RateLimiter::new(2, Duration::from_millis(80));
        rl.acquire().await;
        rl.acquire().await;
        let start = Instant::now();
        rl.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn purges_old_entries_so_window_never_grows_unbounded() {
        let rl = RateLimiter::new(1, Duration::from_millis(20));
        for _ in 0..5 {
            rl.acquire().await;
        }
        assert!(rl.in_flight() <= 1);
    }
}
