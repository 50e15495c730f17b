// Call spacing for rate-limited APIs

use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

/// Enforces a minimum gap, plus optional random jitter, between the end of
/// one call and the start of the next. The first call never waits.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_delay: Duration,
    jitter: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_delay: Duration, jitter: Duration) -> Self {
        Self { min_delay, jitter, last: None }
    }

    /// No spacing at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Gap to enforce before the next call.
    fn next_gap(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.min_delay;
        }
        let extra = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
        self.min_delay + Duration::from_millis(extra)
    }

    /// Block until the next call may start. Returns how long it slept.
    pub fn wait(&mut self) -> Duration {
        let Some(last) = self.last else {
            return Duration::ZERO;
        };
        let remaining = self.next_gap().saturating_sub(last.elapsed());
        if !remaining.is_zero() {
            log::trace!("throttle: sleeping {remaining:?}");
            thread::sleep(remaining);
        }
        remaining
    }

    /// Mark the end of a call.
    pub fn done(&mut self) {
        self.last = Some(Instant::now());
    }
}
