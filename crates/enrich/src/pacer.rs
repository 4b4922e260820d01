//! Process-global request pacing: minimum inter-request delay plus an
//! hourly ceiling.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use grantscout_core::ToolError;

struct PacerState {
    last_request: Option<Instant>,
    window_start: Instant,
    sent_in_window: u32,
}

pub struct RequestPacer {
    min_delay: Duration,
    hourly_ceiling: u32,
    state: Mutex<PacerState>,
}

impl RequestPacer {
    pub fn new(min_delay: Duration, hourly_ceiling: u32) -> Self {
        Self {
            min_delay,
            hourly_ceiling,
            state: Mutex::new(PacerState {
                last_request: None,
                window_start: Instant::now(),
                sent_in_window: 0,
            }),
        }
    }

    /// Wait out the inter-request delay, then claim one slot. Errors with
    /// `RateLimited` when the hourly ceiling is already spent.
    pub async fn acquire(&self) -> Result<(), ToolError> {
        let mut state = self.state.lock().await;

        if state.window_start.elapsed() >= Duration::from_secs(3_600) {
            state.window_start = Instant::now();
            state.sent_in_window = 0;
        }
        if state.sent_in_window >= self.hourly_ceiling {
            return Err(ToolError::rate_limited(format!(
                "hourly ceiling of {} requests reached",
                self.hourly_ceiling
            )));
        }

        if let Some(last) = state.last_request {
            let since = last.elapsed();
            if since < self.min_delay {
                // Holding the lock through the sleep keeps the delay global
                // across every concurrent caller.
                tokio::time::sleep(self.min_delay - since).await;
            }
        }

        state.last_request = Some(Instant::now());
        state.sent_in_window += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enforces_minimum_delay() {
        let pacer = RequestPacer::new(Duration::from_millis(30), 100);
        let started = Instant::now();
        pacer.acquire().await.unwrap();
        pacer.acquire().await.unwrap();
        pacer.acquire().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn hourly_ceiling_is_rate_limited() {
        let pacer = RequestPacer::new(Duration::ZERO, 2);
        pacer.acquire().await.unwrap();
        pacer.acquire().await.unwrap();
        let err = pacer.acquire().await.unwrap_err();
        assert_eq!(err.kind(), grantscout_core::ErrorKind::RateLimited);
    }
}
