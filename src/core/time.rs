use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Clock abstraction to keep window timing off the system wall clock.
///
/// `now` is monotonic and drives every window decision; `utc` only stamps
/// registrations and audit records.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn utc(&self) -> DateTime<Utc>;
    fn sleep(&self, duration: Duration) -> tokio::time::Sleep;
}

/// System-backed clock; replaceable in tests or deterministic replay.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        // Follows tokio's clock so paused-time tests advance it.
        tokio::time::Instant::now().into_std()
    }

    fn utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> tokio::time::Sleep {
        tokio::time::sleep(duration)
    }
}

/// Hand-driven clock for stepping a window tick by tick.
#[derive(Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualTime>>,
}

struct ManualTime {
    now: Instant,
    utc: DateTime<Utc>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualTime {
                now: Instant::now(),
                utc: Utc::now(),
            })),
        }
    }

    /// Move both the monotonic and wall readings forward.
    pub fn advance(&self, duration: Duration) {
        let mut guard = self.inner.lock();
        guard.now += duration;
        guard.utc += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.inner.lock().now
    }

    fn utc(&self) -> DateTime<Utc> {
        self.inner.lock().utc
    }

    fn sleep(&self, duration: Duration) -> tokio::time::Sleep {
        tokio::time::sleep(duration)
    }
}
