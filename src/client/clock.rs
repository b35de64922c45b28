//! Time source for the probe timing loops

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Monotonic time source
///
/// `now` returns the time elapsed since an arbitrary fixed origin. Only
/// differences between two readings are meaningful.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deterministic clock that advances by a fixed step on every reading
#[derive(Debug)]
pub struct StepClock {
    current: Cell<Duration>,
    step: Duration,
}

impl StepClock {
    pub fn new(step: Duration) -> Self {
        Self {
            current: Cell::new(Duration::ZERO),
            step,
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> Duration {
        let now = self.current.get();
        self.current.set(now + self.step);
        now
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}
