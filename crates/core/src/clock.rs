//! Injectable time source.
//!
//! Polling loops and the run trigger never call `tokio::time` directly;
//! they go through a [`Clock`] so tests can drive time by hand with
//! [`ManualClock`] and finish instantly.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;

use crate::types::Timestamp;

/// Monotonic time, wall time and sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic instant, used for deadlines.
    fn now(&self) -> Instant;

    /// Wall-clock time, used for filenames and metadata.
    fn wall(&self) -> Timestamp;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the OS and tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> Timestamp {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` advances time immediately instead of waiting.
///
/// Every sleep yields to the runtime once so that cooperative loops driven
/// by this clock still let other tasks make progress.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    wall_base: Timestamp,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(wall_base: Timestamp) -> Self {
        Self {
            base: Instant::now(),
            wall_base,
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Move virtual time forward without sleeping.
    pub fn advance(&self, duration: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += duration;
    }

    /// Total virtual time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn wall(&self) -> Timestamp {
        let offset = chrono::Duration::from_std(self.elapsed()).unwrap_or_default();
        self.wall_base + offset
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}
