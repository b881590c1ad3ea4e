use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time source used by the watch engine. Implementations return wall-clock
/// epoch milliseconds so in-memory timestamps stay comparable with the
/// `modified` fields carried by index records.
pub trait Clock {
    /// Returns the current time in unix epoch milliseconds.
    fn now_ms(&mut self) -> u64;

    /// Suspends the caller for the given duration.
    fn sleep(&mut self, duration: Duration);
}

/// System clock backed by `SystemTime` and `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&mut self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis().min(u128::from(u64::MAX)) as u64)
            .unwrap_or(0)
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Fixed-cadence timer polled with an injected timestamp. The first poll arms
/// the timer without firing; subsequent polls fire once per elapsed period.
#[derive(Debug, Clone, Copy)]
pub struct PeriodTimer {
    period_ms: u64,
    last_ms: Option<u64>,
}

impl PeriodTimer {
    /// Builds a timer with the provided cadence.
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    /// Returns the configured cadence.
    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Polls the timer; returns true when a full period has elapsed since the
    /// previous firing (or since the arming poll).
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.last_ms {
            None => {
                self.last_ms = Some(now_ms);
                false
            }
            Some(last) if now_ms.saturating_sub(last) >= self.period_ms => {
                self.last_ms = Some(now_ms);
                true
            }
            Some(_) => false,
        }
    }
}
