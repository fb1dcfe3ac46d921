//! Injectable delays.
//!
//! Every suspension point (per-source delay, thinking delay, cleanup
//! window) goes through a `Scheduler`, so tests can run without waiting on
//! the wall clock.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

/// Source of cooperative delays
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real delays backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records each requested delay and only yields instead of sleeping
#[derive(Debug, Default)]
pub struct InstantScheduler {
    requested: Mutex<Vec<Duration>>,
}

impl InstantScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order
    pub fn requested(&self) -> Vec<Duration> {
        self.requested.lock().clone()
    }

    /// Sum of all requested delays
    pub fn total(&self) -> Duration {
        self.requested.lock().iter().sum()
    }
}

#[async_trait]
impl Scheduler for InstantScheduler {
    async fn sleep(&self, duration: Duration) {
        self.requested.lock().push(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_instant_scheduler_records_delays() {
        let scheduler = InstantScheduler::new();
        scheduler.sleep(Duration::from_millis(1500)).await;
        scheduler.sleep(Duration::from_secs(1)).await;

        assert_eq!(
            scheduler.requested(),
            vec![Duration::from_millis(1500), Duration::from_secs(1)]
        );
        assert_eq!(scheduler.total(), Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_waits_on_timer() {
        let start = tokio::time::Instant::now();
        TokioScheduler.sleep(Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
