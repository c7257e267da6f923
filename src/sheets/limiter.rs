//! Sliding-window call budget for the spreadsheet API.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Tracks recent call timestamps against a per-window quota. When the
/// quota fills, `register_call` sleeps until the oldest call leaves the
/// window, then starts a fresh window. Single-threaded; state does not
/// survive the process.
pub struct RateLimiter {
    ceiling: usize,
    window: Duration,
    calls: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(ceiling: usize, window_secs: u64) -> Self {
        Self {
            ceiling: ceiling.max(1),
            window: Duration::from_secs(window_secs),
            calls: VecDeque::new(),
        }
    }

    /// Record one call, suspending first if the window is already full.
    pub async fn register_call(&mut self) {
        let now = Instant::now();
        while let Some(front) = self.calls.front() {
            if now.duration_since(*front) >= self.window {
                self.calls.pop_front();
            } else {
                break;
            }
        }

        self.calls.push_back(now);

        if self.calls.len() >= self.ceiling {
            if let Some(oldest) = self.calls.front() {
                let wait = self.window.saturating_sub(now.duration_since(*oldest));
                info!(
                    "Spreadsheet call quota reached ({} in {:?}), pausing for {:?}",
                    self.calls.len(),
                    self.window,
                    wait
                );
                tokio::time::sleep(wait).await;
            }
            self.calls.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_below_ceiling_never_sleeps() {
        let mut limiter = RateLimiter::new(5, 60);
        let start = Instant::now();
        for _ in 0..4 {
            limiter.register_call().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_call_sleeps_until_window_expires() {
        let mut limiter = RateLimiter::new(3, 60);
        let start = Instant::now();
        limiter.register_call().await;
        limiter.register_call().await;
        limiter.register_call().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_clears_after_pause() {
        let mut limiter = RateLimiter::new(3, 60);
        for _ in 0..3 {
            limiter.register_call().await;
        }

        // The window was cleared by the pause, so two more calls are free.
        let resumed = Instant::now();
        limiter.register_call().await;
        limiter.register_call().await;
        assert_eq!(resumed.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_calls_fall_out_of_window() {
        let mut limiter = RateLimiter::new(3, 60);
        limiter.register_call().await;
        limiter.register_call().await;

        tokio::time::advance(Duration::from_secs(61)).await;

        // Both earlier calls expired; this one starts a fresh count.
        let start = Instant::now();
        limiter.register_call().await;
        limiter.register_call().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
