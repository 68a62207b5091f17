use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window rate limiter with a minimum spacing between request starts:
/// at most `max_requests` per `window`, and never closer together than `min_spacing`.
#[derive(Clone)]
pub struct RequestPacer {
    state: Arc<Mutex<PacerState>>,
    max_requests: usize,
    window: Duration,
    min_spacing: Duration,
}

struct PacerState {
    timestamps: VecDeque<Instant>,
    last: Option<Instant>,
}

impl RequestPacer {
    pub fn new(max_requests: usize, window: Duration, min_spacing: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(PacerState {
                timestamps: VecDeque::new(),
                last: None,
            })),
            max_requests: max_requests.max(1),
            window,
            min_spacing,
        }
    }

    /// Per-minute ceiling plus fixed spacing.
    pub fn per_minute(max_requests: usize, min_spacing: Duration) -> Self {
        Self::new(max_requests, Duration::from_secs(60), min_spacing)
    }

    pub async fn acquire(&self) {
        loop {
            let mut state = self.state.lock().await;
            let now = Instant::now();

            // Drop timestamps outside the window
            while let Some(&front) = state.timestamps.front() {
                if now.duration_since(front) >= self.window {
                    state.timestamps.pop_front();
                } else {
                    break;
                }
            }

            let mut wait = Duration::ZERO;
            if state.timestamps.len() >= self.max_requests {
                if let Some(&oldest) = state.timestamps.front() {
                    wait = (oldest + self.window).saturating_duration_since(now);
                }
            }
            if let Some(last) = state.last {
                wait = wait.max((last + self.min_spacing).saturating_duration_since(now));
            }

            if wait.is_zero() {
                state.timestamps.push_back(now);
                state.last = Some(now);
                return;
            }

            drop(state);
            tracing::debug!("Request pacer: waiting {:.2}s for a slot", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_min_spacing_between_requests() {
        let pacer = RequestPacer::per_minute(100, Duration::from_millis(500));
        let start = Instant::now();
        pacer.acquire().await;
        pacer.acquire().await;
        pacer.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_ceiling() {
        let pacer = RequestPacer::new(2, Duration::from_secs(10), Duration::ZERO);
        let start = Instant::now();
        pacer.acquire().await;
        pacer.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
        pacer.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }
}
