//! Global request pacing
//!
//! The [`RequestPacer`] bounds request throughput across every fetch in the process,
//! regardless of how many requests are in flight. It is a lock-free slot scheduler:
//! each caller atomically reserves the next free start time (slots are `min_interval`
//! apart) and sleeps until its slot arrives.
//!
//! With the default one-second interval this keeps the collector at or under 60 requests
//! per minute, the budget the GitHub REST API tolerates for sustained crawling.

use crate::config::PacingConfig;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Request pacer shared by all fetches
///
/// Cloning is cheap; clones share the same schedule.
///
/// # Implementation
///
/// Uses AtomicU64 for lock-free slot tracking:
/// - `interval_nanos`: fixed spacing between request starts (0 = unpaced)
/// - `next_slot`: earliest start time of the next request (nanoseconds since an
///   arbitrary process-wide epoch)
#[derive(Clone, Debug)]
pub struct RequestPacer {
    interval_nanos: u64,
    next_slot: Arc<AtomicU64>,
}

impl RequestPacer {
    /// Create a pacer with the given spacing between request starts
    ///
    /// # Examples
    ///
    /// ```
    /// use contrib_report::pacing::RequestPacer;
    /// use std::time::Duration;
    ///
    /// // At most 60 requests per minute
    /// let pacer = RequestPacer::new(Duration::from_secs(1));
    /// assert_eq!(pacer.interval(), Duration::from_secs(1));
    /// ```
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            interval_nanos: duration_nanos(min_interval),
            next_slot: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a pacer from configuration
    #[must_use]
    pub fn from_config(config: &PacingConfig) -> Self {
        Self::new(config.min_interval)
    }

    /// A pacer that never waits
    #[must_use]
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Current spacing between request starts
    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_nanos)
    }

    /// Wait for this caller's request slot
    ///
    /// Returns immediately when pacing is disabled or when the schedule is idle.
    pub async fn acquire(&self) {
        let wait = self.reserve();
        if !wait.is_zero() {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Pacing request");
            tokio::time::sleep(wait).await;
        }
    }

    /// Reserve the next free slot and return how long to wait for it
    fn reserve(&self) -> Duration {
        let interval = self.interval_nanos;
        if interval == 0 {
            return Duration::ZERO;
        }

        loop {
            let now = Self::now_nanos();
            let next = self.next_slot.load(Ordering::SeqCst);
            let slot = next.max(now);

            if self
                .next_slot
                .compare_exchange(
                    next,
                    slot.saturating_add(interval),
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return Duration::from_nanos(slot - now);
            }
            // Another caller took the slot; re-read and try the following one
        }
    }

    /// Monotonic nanoseconds since the first call in this process
    fn now_nanos() -> u64 {
        static START: OnceLock<Instant> = OnceLock::new();
        let start = START.get_or_init(Instant::now);
        duration_nanos(start.elapsed())
    }
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::from_config(&PacingConfig::default())
    }
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
